use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default binarization threshold
pub const DEFAULT_THRESHOLD: u32 = 90;
/// Default opening structuring element side
pub const DEFAULT_OPENING_SIZE: u32 = 8;
/// Default closing structuring element side
pub const DEFAULT_CLOSING_SIZE: u32 = 80;

/// Largest threshold that still means something for 8-bit channels
pub const MAX_THRESHOLD: u32 = u8::MAX as u32;

/// Per-frame tuning knobs
///
/// Supplied fresh on every composite call; the compositor keeps no copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositingParameters {
    /// Mean channel difference a pixel must exceed to count as foreground
    pub threshold: u32,
    /// Side of the square element used for opening (speck removal)
    pub opening_size: u32,
    /// Side of the square element used for closing (hole filling)
    pub closing_size: u32,
}

impl Default for CompositingParameters {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            opening_size: DEFAULT_OPENING_SIZE,
            closing_size: DEFAULT_CLOSING_SIZE,
        }
    }
}

impl CompositingParameters {
    pub fn new(threshold: u32, opening_size: u32, closing_size: u32) -> Self {
        Self {
            threshold,
            opening_size,
            closing_size,
        }
    }

    /// Check ranges: threshold in 0..=255, both sizes positive
    pub fn validate(&self) -> Result<()> {
        check_threshold(self.threshold)?;
        if self.opening_size == 0 {
            return Err(Error::invalid_parameter("opening size must be positive"));
        }
        if self.closing_size == 0 {
            return Err(Error::invalid_parameter("closing size must be positive"));
        }
        Ok(())
    }
}

/// Reject thresholds that no 8-bit difference can be compared against
pub fn check_threshold(threshold: u32) -> Result<()> {
    if threshold > MAX_THRESHOLD {
        return Err(Error::invalid_parameter(format!(
            "threshold {} is outside 0..={}",
            threshold, MAX_THRESHOLD
        )));
    }
    Ok(())
}

/// How the per-channel difference is turned into a foreground decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinarizePolicy {
    /// Average the absolute channel differences, then compare against the
    /// threshold (strictly greater is foreground)
    #[default]
    MeanThenThreshold,
    /// Binarize every channel to 0/255 against the threshold first, then
    /// compare the mean of the binarized channels against the threshold
    ThresholdThenMean,
}
