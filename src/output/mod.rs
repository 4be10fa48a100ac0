mod file;
#[cfg(feature = "webcam")]
mod loopback;

pub use file::ImageFileOutput;
#[cfg(feature = "webcam")]
pub use loopback::V4L2Output;

use anyhow::Result;
use image::{DynamicImage, RgbImage, RgbaImage};

/// Trait for output destinations
pub trait OutputSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Get the expected output resolution, `None` when any size is accepted
    fn resolution(&self) -> Option<(u32, u32)>;
}

impl<O: OutputSink + ?Sized> OutputSink for Box<O> {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        (**self).resolution()
    }
}

/// Display-ready copy of a composite with an opaque alpha channel
pub fn to_display_rgba(frame: &RgbImage) -> RgbaImage {
    DynamicImage::ImageRgb8(frame.clone()).to_rgba8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    #[test]
    fn display_conversion_is_opaque() {
        let frame = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        let display = to_display_rgba(&frame);
        assert_eq!(display.dimensions(), (2, 2));
        assert_eq!(display.get_pixel(1, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn display_conversion_keeps_every_colour() {
        let frame = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8 * 50, y as u8 * 100, 255]));
        let display = to_display_rgba(&frame);
        for (x, y, pixel) in display.enumerate_pixels() {
            let [r, g, b] = frame.get_pixel(x, y).0;
            assert_eq!(pixel, &Rgba([r, g, b, 255]), "mismatch at ({x}, {y})");
        }
    }
}
