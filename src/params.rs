//! Sources for the per-frame compositing parameters.
//!
//! The pipeline asks its source once per frame, so a source that changes its
//! answer retunes the composite on the next frame without a restart.

use crate::compositor::CompositingParameters;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Bounds a tuning front-end offers for the threshold
pub const THRESHOLD_RANGE: RangeInclusive<u32> = 0..=255;
/// Bounds a tuning front-end offers for both structuring element sizes
pub const KERNEL_SIZE_RANGE: RangeInclusive<u32> = 4..=100;

pub trait ParameterSource {
    /// Parameters for the frame about to be composited
    fn current(&mut self) -> CompositingParameters;
}

/// Always answers with the same values, unchecked
impl ParameterSource for CompositingParameters {
    fn current(&mut self) -> CompositingParameters {
        *self
    }
}

/// Clamp every field into the front-end bounds
pub fn clamp_to_bounds(params: CompositingParameters) -> CompositingParameters {
    CompositingParameters {
        threshold: params
            .threshold
            .clamp(*THRESHOLD_RANGE.start(), *THRESHOLD_RANGE.end()),
        opening_size: params
            .opening_size
            .clamp(*KERNEL_SIZE_RANGE.start(), *KERNEL_SIZE_RANGE.end()),
        closing_size: params
            .closing_size
            .clamp(*KERNEL_SIZE_RANGE.start(), *KERNEL_SIZE_RANGE.end()),
    }
}

/// JSON file re-read whenever its modification time changes
///
/// Values are clamped into the front-end bounds. A file that is missing or
/// does not parse leaves the last good values in place.
pub struct ParamsFile {
    path: PathBuf,
    last: CompositingParameters,
    /// Modification time of the last version that parsed
    modified: Option<SystemTime>,
    /// Modification time of the last version that did not, warned about once
    rejected: Option<SystemTime>,
}

impl ParamsFile {
    pub fn new<P: AsRef<Path>>(path: P, initial: CompositingParameters) -> Self {
        let path = path.as_ref().to_path_buf();
        tracing::info!("Watching {} for parameter changes", path.display());
        Self {
            path,
            last: clamp_to_bounds(initial),
            modified: None,
            rejected: None,
        }
    }

    fn reload(&mut self) {
        let modified = match std::fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                tracing::debug!("Parameter file {} unavailable: {}", self.path.display(), err);
                return;
            }
        };
        // only a successful parse marks an mtime as seen
        if self.modified == Some(modified) {
            return;
        }

        let parsed = std::fs::read_to_string(&self.path)
            .map_err(|err| err.to_string())
            .and_then(|text| {
                serde_json::from_str::<CompositingParameters>(&text).map_err(|err| err.to_string())
            });

        match parsed {
            Ok(params) => {
                let clamped = clamp_to_bounds(params);
                if clamped != params {
                    tracing::warn!("Clamped parameters {:?} to {:?}", params, clamped);
                }
                if clamped != self.last {
                    tracing::info!(
                        "Parameters changed: threshold={}, opening={}, closing={}",
                        clamped.threshold,
                        clamped.opening_size,
                        clamped.closing_size
                    );
                }
                self.last = clamped;
                self.modified = Some(modified);
                self.rejected = None;
            }
            Err(err) => {
                if self.rejected != Some(modified) {
                    tracing::warn!(
                        "Ignoring unreadable parameter file {}: {}",
                        self.path.display(),
                        err
                    );
                    self.rejected = Some(modified);
                }
            }
        }
    }
}

impl ParameterSource for ParamsFile {
    fn current(&mut self) -> CompositingParameters {
        self.reload();
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_and_bump(path: &Path, contents: &str, offset_secs: u64) {
        std::fs::write(path, contents).unwrap();
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 + offset_secs))
            .unwrap();
    }

    #[test]
    fn fixed_parameters_pass_through_unchecked() {
        let mut fixed = CompositingParameters::new(300, 0, 0);
        assert_eq!(fixed.current(), CompositingParameters::new(300, 0, 0));
    }

    #[test]
    fn clamping_respects_front_end_bounds() {
        let clamped = clamp_to_bounds(CompositingParameters::new(999, 1, 500));
        assert_eq!(clamped, CompositingParameters::new(255, 4, 100));
    }

    #[test]
    fn missing_file_keeps_initial_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ParamsFile::new(
            dir.path().join("absent.json"),
            CompositingParameters::new(60, 5, 20),
        );
        assert_eq!(source.current(), CompositingParameters::new(60, 5, 20));
    }

    #[test]
    fn edits_are_picked_up_between_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        let mut source = ParamsFile::new(&path, CompositingParameters::default());

        write_and_bump(
            &path,
            r#"{"threshold": 40, "opening_size": 6, "closing_size": 30}"#,
            1,
        );
        assert_eq!(source.current(), CompositingParameters::new(40, 6, 30));

        write_and_bump(&path, r#"{"threshold": 70, "opening_size": 2}"#, 2);
        let params = source.current();
        assert_eq!(params.threshold, 70);
        assert_eq!(params.opening_size, 4);
    }

    #[test]
    fn rewrite_within_same_mtime_tick_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        let mut source = ParamsFile::new(&path, CompositingParameters::default());

        // partial write observed mid-save
        write_and_bump(&path, r#"{"threshold": 3"#, 5);
        assert_eq!(source.current(), CompositingParameters::default());

        // finished write lands with the same coarse timestamp
        write_and_bump(&path, r#"{"threshold": 33, "opening_size": 5}"#, 5);
        let params = source.current();
        assert_eq!(params.threshold, 33);
        assert_eq!(params.opening_size, 5);
    }

    #[test]
    fn garbage_keeps_last_good_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        let mut source = ParamsFile::new(&path, CompositingParameters::default());

        write_and_bump(&path, r#"{"threshold": 12}"#, 1);
        assert_eq!(source.current().threshold, 12);

        write_and_bump(&path, "{ not json", 2);
        assert_eq!(source.current().threshold, 12);
    }
}
