use super::{to_display_rgba, OutputSink};
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::PathBuf;

const FRAME_PLACEHOLDER: &str = "{frame}";

/// Writes composites to image files
///
/// A `{frame}` placeholder in the path is replaced by a zero-padded frame
/// number; without one every frame overwrites the same file.
pub struct ImageFileOutput {
    pattern: String,
    with_alpha: bool,
    written: u64,
}

impl ImageFileOutput {
    pub fn new<S: Into<String>>(pattern: S) -> Self {
        let pattern = pattern.into();
        tracing::info!("Writing frames to {}", pattern);
        Self {
            pattern,
            with_alpha: false,
            written: 0,
        }
    }

    /// Save 4-channel frames instead of plain RGB
    pub fn with_alpha(mut self, with_alpha: bool) -> Self {
        self.with_alpha = with_alpha;
        self
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    fn path_for(&self, index: u64) -> PathBuf {
        if self.pattern.contains(FRAME_PLACEHOLDER) {
            PathBuf::from(
                self.pattern
                    .replace(FRAME_PLACEHOLDER, &format!("{:06}", index)),
            )
        } else {
            PathBuf::from(&self.pattern)
        }
    }
}

impl OutputSink for ImageFileOutput {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let path = self.path_for(self.written);
        let saved = if self.with_alpha {
            to_display_rgba(frame).save(&path)
        } else {
            frame.save(&path)
        };
        saved.with_context(|| format!("Failed to write frame to {}", path.display()))?;

        tracing::debug!("Wrote {}", path.display());
        self.written += 1;
        Ok(())
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, Rgb};

    #[test]
    fn numbered_frames_get_their_own_files() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("out_{frame}.png");
        let mut output = ImageFileOutput::new(pattern.to_string_lossy());

        let frame = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        output.write_frame(&frame).unwrap();
        output.write_frame(&frame).unwrap();

        assert_eq!(output.frames_written(), 2);
        assert!(dir.path().join("out_000000.png").is_file());
        assert!(dir.path().join("out_000001.png").is_file());
    }

    #[test]
    fn alpha_output_saves_four_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.png");
        let mut output = ImageFileOutput::new(path.to_string_lossy()).with_alpha(true);

        output
            .write_frame(&RgbImage::from_pixel(1, 1, Rgb([9, 9, 9])))
            .unwrap();

        let saved = image::open(&path).unwrap();
        assert_eq!(saved.color(), ColorType::Rgba8);
    }
}
