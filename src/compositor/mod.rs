mod mask;
pub mod morphology;
pub mod types;

pub use mask::{binarize, ForegroundMask};
pub use morphology::StructuringElement;
pub use types::{BinarizePolicy, CompositingParameters};

use crate::error::{Error, Result};
use image::{imageops, DynamicImage, RgbImage};
use ndarray::{Array3, Axis, Zip};

/// Replaces the static scene behind a subject with a virtual background
///
/// Holds the empty-scene reference photo and the replacement image, both
/// 3-channel and pixel-aligned. Immutable after construction, so one
/// instance can be shared between threads.
#[derive(Debug, Clone)]
pub struct BackgroundCompositor {
    reference: RgbImage,
    virtual_background: RgbImage,
    policy: BinarizePolicy,
}

impl BackgroundCompositor {
    /// Build a compositor from the empty-scene reference and the replacement
    ///
    /// The virtual background is resized (bilinear) to the reference size when
    /// they differ. Both are normalized to 3 channels.
    pub fn new(reference: &DynamicImage, virtual_background: &DynamicImage) -> Result<Self> {
        if reference.width() == 0 || reference.height() == 0 {
            return Err(Error::configuration("reference background is empty"));
        }
        if virtual_background.width() == 0 || virtual_background.height() == 0 {
            return Err(Error::configuration("virtual background is empty"));
        }
        let channels = reference.color().channel_count();
        if !matches!(channels, 3 | 4) {
            return Err(Error::configuration(format!(
                "reference background must have 3 or 4 channels, got {}",
                channels
            )));
        }

        let reference = reference.to_rgb8();
        let (width, height) = reference.dimensions();

        let virtual_background = if (virtual_background.width(), virtual_background.height())
            != (width, height)
        {
            tracing::info!(
                "Resizing virtual background from {}x{} to {}x{}",
                virtual_background.width(),
                virtual_background.height(),
                width,
                height
            );
            imageops::resize(
                &virtual_background.to_rgb8(),
                width,
                height,
                imageops::FilterType::Triangle,
            )
        } else {
            virtual_background.to_rgb8()
        };

        Ok(Self {
            reference,
            virtual_background,
            policy: BinarizePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: BinarizePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> BinarizePolicy {
        self.policy
    }

    /// (width, height) every frame must have
    pub fn dimensions(&self) -> (u32, u32) {
        self.reference.dimensions()
    }

    pub fn reference(&self) -> &RgbImage {
        &self.reference
    }

    pub fn virtual_background(&self) -> &RgbImage {
        &self.virtual_background
    }

    /// Binarize `frame` against the reference, then open and close the result
    pub fn foreground_mask(
        &self,
        frame: &RgbImage,
        params: &CompositingParameters,
    ) -> Result<ForegroundMask> {
        params.validate()?;
        self.check_shape(frame)?;

        let opening = StructuringElement::square(params.opening_size)?;
        let closing = StructuringElement::square(params.closing_size)?;

        let raw = binarize(frame, &self.reference, params.threshold, self.policy)?;

        let _span = tracing::debug_span!(
            "morphology",
            opening = opening.size(),
            closing = closing.size()
        )
        .entered();
        let opened = morphology::open(&raw, opening);
        let cleaned = morphology::close(&opened, closing);

        Ok(ForegroundMask::from_array(cleaned))
    }

    /// Keep foreground pixels of `frame`, take the rest from the virtual background
    pub fn composite(&self, frame: &RgbImage, params: &CompositingParameters) -> Result<RgbImage> {
        let mask = self.foreground_mask(frame, params)?;
        self.apply_mask(frame, &mask)
    }

    /// `frame * mask + virtual * (1 - mask)`, evaluated in u16 and saturated back to u8
    pub fn apply_mask(&self, frame: &RgbImage, mask: &ForegroundMask) -> Result<RgbImage> {
        let _span = tracing::debug_span!("apply_mask").entered();
        self.check_shape(frame)?;
        if (mask.width(), mask.height()) != self.dimensions() {
            return Err(Error::ShapeMismatch {
                expected: self.dimensions(),
                actual: (mask.width(), mask.height()),
            });
        }

        let (width, height) = self.dimensions();
        let shape = (height as usize, width as usize, 3);

        let live = mask::pixel_view(frame)?;
        let scene = mask::pixel_view(&self.virtual_background)?;
        let expanded = mask.as_array().view().insert_axis(Axis(2));
        let selector = expanded
            .broadcast(shape)
            .ok_or_else(|| Error::configuration("mask cannot be broadcast over 3 channels"))?;

        let mut output = Array3::<u8>::zeros(shape);
        Zip::from(&mut output)
            .and(&live)
            .and(&scene)
            .and(&selector)
            .for_each(|out, &fg, &bg, &keep| {
                let m = u16::from(keep);
                let value = u16::from(fg) * m + u16::from(bg) * (1 - m);
                *out = u8::try_from(value).unwrap_or(u8::MAX);
            });

        RgbImage::from_raw(width, height, output.into_raw_vec()).ok_or_else(|| {
            Error::configuration("composited buffer does not match frame dimensions")
        })
    }

    fn check_shape(&self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != self.dimensions() {
            return Err(Error::ShapeMismatch {
                expected: self.dimensions(),
                actual: frame.dimensions(),
            });
        }
        Ok(())
    }
}
