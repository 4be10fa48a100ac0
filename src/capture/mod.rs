mod still;
#[cfg(feature = "webcam")]
mod v4l_capture;

pub use still::{load_image, ImageSequence};
#[cfg(feature = "webcam")]
pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::{imageops, RgbImage};

/// Trait for frame sources feeding the compositor
pub trait CaptureSource {
    /// Capture the next frame, `None` once the source is exhausted
    fn capture_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}

/// Wraps a source and flips every frame horizontally for a mirror-like view
pub struct Mirrored<C> {
    inner: C,
}

impl<C: CaptureSource> Mirrored<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: CaptureSource> CaptureSource for Mirrored<C> {
    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self
            .inner
            .capture_frame()?
            .map(|frame| imageops::flip_horizontal(&frame)))
    }

    fn resolution(&self) -> (u32, u32) {
        self.inner.resolution()
    }
}

impl<C: CaptureSource + ?Sized> CaptureSource for Box<C> {
    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).capture_frame()
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }
}
