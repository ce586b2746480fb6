//! Client-side checks that run before an upload is sent.
use thiserror::Error;

pub const MAX_VIDEO_SIZE_MB: u64 = 100;
pub const ALLOWED_VIDEO_FORMATS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv"];
pub const MIN_INTERVAL_SECONDS: f64 = 0.1;
pub const MAX_INTERVAL_SECONDS: f64 = 60.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("No file selected")]
    NoFile,
    #[error("File too large. Maximum size: {max_mb} MB (current: {actual_mb:.2} MB)")]
    TooLarge { max_mb: u64, actual_mb: f64 },
    #[error("Invalid format. Allowed: {allowed}", allowed = ALLOWED_VIDEO_FORMATS.join(", "))]
    InvalidFormat { extension: String },
    #[error("Interval must be between {min} and {max} seconds")]
    IntervalOutOfRange { min: f64, max: f64, actual: f64 },
    #[error("{}", join_messages(.0))]
    Multiple(Vec<ValidationError>),
}

/// Check a video file's size and extension. Every violation is reported.
pub fn validate_video_file(file_name: &str, size_bytes: u64) -> Result<(), ValidationError> {
    if file_name.trim().is_empty() {
        return Err(ValidationError::NoFile);
    }

    let mut errors = Vec::new();

    let actual_mb = size_bytes as f64 / BYTES_PER_MB;
    if actual_mb > MAX_VIDEO_SIZE_MB as f64 {
        errors.push(ValidationError::TooLarge {
            max_mb: MAX_VIDEO_SIZE_MB,
            actual_mb,
        });
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_VIDEO_FORMATS.contains(&extension.as_str()) {
        errors.push(ValidationError::InvalidFormat { extension });
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

/// Frame sampling interval, in seconds.
pub fn validate_interval(seconds: f64) -> Result<(), ValidationError> {
    if (MIN_INTERVAL_SECONDS..=MAX_INTERVAL_SECONDS).contains(&seconds) {
        Ok(())
    } else {
        Err(ValidationError::IntervalOutOfRange {
            min: MIN_INTERVAL_SECONDS,
            max: MAX_INTERVAL_SECONDS,
            actual: seconds,
        })
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
