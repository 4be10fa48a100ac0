//! Error types for background replacement

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Construction-time invalid input (empty image, missing background)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Frame dimensions differ from the captured reference background
    #[error(
        "Frame is {}x{} but the reference background is {}x{}",
        .actual.0, .actual.1, .expected.0, .expected.1
    )]
    ShapeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Threshold or structuring element size out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Image file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Buffer/array shape disagreement while building views over pixel data
    #[error("Pixel buffer layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

impl Error {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_message_names_both_sizes() {
        let err = Error::ShapeMismatch {
            expected: (640, 480),
            actual: (320, 240),
        };
        let msg = err.to_string();
        assert!(msg.contains("320x240"));
        assert!(msg.contains("640x480"));
    }

    #[test]
    fn helpers_build_expected_variants() {
        assert!(matches!(
            Error::configuration("empty"),
            Error::Configuration(_)
        ));
        assert_eq!(
            Error::invalid_parameter("threshold 256").to_string(),
            "Invalid parameter: threshold 256"
        );
    }
}
