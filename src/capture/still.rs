use super::CaptureSource;
use crate::error::{Error, Result as CoreResult};
use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Load and decode an image file
///
/// Missing files map to `Error::FileNotFound`, unreadable or corrupt ones to
/// `Error::Decode`.
pub fn load_image<P: AsRef<Path>>(path: P) -> CoreResult<DynamicImage> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    image::open(path).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Frames read from disk: a single still or every image in a directory,
/// in file name order
pub struct ImageSequence {
    pending: VecDeque<PathBuf>,
    width: u32,
    height: u32,
}

impl ImageSequence {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let frames = if path.is_dir() {
            let mut frames = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("Failed to list frames in {}", path.display()))?
            {
                let candidate = entry?.path();
                if is_frame_file(&candidate) {
                    frames.push(candidate);
                }
            }
            frames.sort();
            frames
        } else {
            vec![path.to_path_buf()]
        };

        let first = frames
            .first()
            .with_context(|| format!("No image frames found in {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("Failed to read dimensions of {}", first.display()))?;

        tracing::info!(
            "Opened {} frame(s) from {} at {}x{}",
            frames.len(),
            path.display(),
            width,
            height
        );

        Ok(Self {
            pending: frames.into(),
            width,
            height,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

impl CaptureSource for ImageSequence {
    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let frame = load_image(&path)
            .with_context(|| format!("Failed to load frame {}", path.display()))?;
        Ok(Some(frame.to_rgb8()))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn missing_file_is_reported() {
        let err = load_image("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn directory_frames_come_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(3, 2, Rgb([2, 2, 2]))
            .save(dir.path().join("frame_002.png"))
            .unwrap();
        RgbImage::from_pixel(3, 2, Rgb([1, 1, 1]))
            .save(dir.path().join("frame_001.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut sequence = ImageSequence::open(dir.path()).unwrap();
        assert_eq!(sequence.remaining(), 2);
        assert_eq!(sequence.resolution(), (3, 2));

        let first = sequence.capture_frame().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), &Rgb([1, 1, 1]));
        let second = sequence.capture_frame().unwrap().unwrap();
        assert_eq!(second.get_pixel(0, 0), &Rgb([2, 2, 2]));
        assert!(sequence.capture_frame().unwrap().is_none());
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageSequence::open(dir.path()).is_err());
    }
}
