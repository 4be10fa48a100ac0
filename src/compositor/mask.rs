use super::types::{check_threshold, BinarizePolicy};
use crate::error::{Error, Result};
use image::{Rgb, RgbImage};
use ndarray::{Array2, ArrayView3, Axis, Zip};

/// Per-pixel foreground classification, `true` = subject
///
/// Shape is (height, width). Rebuilt for every frame and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundMask {
    cells: Array2<bool>,
}

impl ForegroundMask {
    pub fn from_array(cells: Array2<bool>) -> Self {
        Self { cells }
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.cells
    }

    pub fn into_array(self) -> Array2<bool> {
        self.cells
    }

    pub fn width(&self) -> u32 {
        self.cells.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.cells.nrows() as u32
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.cells[[y as usize, x as usize]]
    }

    pub fn foreground_count(&self) -> usize {
        self.cells.iter().filter(|&&set| set).count()
    }

    /// Render as a black/white image for visualization
    pub fn to_luma_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let value = if self.is_foreground(x, y) { u8::MAX } else { 0 };
            Rgb([value, value, value])
        })
    }
}

/// View an RGB buffer as an (height, width, 3) array without copying
pub(crate) fn pixel_view(image: &RgbImage) -> Result<ArrayView3<'_, u8>> {
    let (width, height) = image.dimensions();
    let view = ArrayView3::from_shape((height as usize, width as usize, 3), image.as_raw())?;
    Ok(view)
}

/// Classify every pixel of `frame` against `reference`
///
/// Differences are absolute, so a subject darker than the scene is detected
/// as readily as a brighter one. A pixel is foreground only when its score is
/// strictly greater than `threshold`, which must lie in 0..=255.
pub fn binarize(
    frame: &RgbImage,
    reference: &RgbImage,
    threshold: u32,
    policy: BinarizePolicy,
) -> Result<Array2<bool>> {
    let _span = tracing::debug_span!("binarize", ?policy, threshold).entered();

    check_threshold(threshold)?;
    if frame.dimensions() != reference.dimensions() {
        return Err(Error::ShapeMismatch {
            expected: reference.dimensions(),
            actual: frame.dimensions(),
        });
    }

    let frame = pixel_view(frame)?;
    let reference = pixel_view(reference)?;
    let (height, width, channels) = frame.dim();
    let mut mask = Array2::from_elem((height, width), false);

    // Compare channel sums against channels * threshold so the mean never
    // needs rounding
    let limit = channels as u32 * threshold;

    Zip::from(&mut mask)
        .and(frame.lanes(Axis(2)))
        .and(reference.lanes(Axis(2)))
        .for_each(|cell, live, still| {
            let sum: u32 = live
                .iter()
                .zip(still.iter())
                .map(|(&a, &b)| {
                    let diff = u32::from(a.abs_diff(b));
                    match policy {
                        BinarizePolicy::MeanThenThreshold => diff,
                        BinarizePolicy::ThresholdThenMean => {
                            if diff > threshold {
                                u32::from(u8::MAX)
                            } else {
                                0
                            }
                        }
                    }
                })
                .sum();
            *cell = sum > limit;
        });

    Ok(mask)
}
