//! Error types for gazetrace.

use thiserror::Error;

/// Failures surfaced by the capture pipeline. None of them end the session;
/// the operator can retry the failed step.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The gaze engine is missing or failed to start.
    #[error("gaze estimator unavailable: {0}")]
    EstimatorUnavailable(String),

    /// Audio capture is not available in this environment.
    #[error("audio capture is not supported on this device")]
    DeviceUnsupported,

    /// The audio input failed while opening or capturing.
    #[error("audio device error: {0}")]
    DeviceError(String),

    /// Recording or calibration was requested before the estimator was ready.
    #[error("gaze estimator is not ready")]
    NotReady,

    /// An operation that needs an active recording ran without one.
    #[error("no recording in progress")]
    NotRecording,

    /// Sampling frequency must be a positive, finite number of hertz.
    #[error("invalid sampling frequency: {0} Hz")]
    InvalidFrequency(f64),

    /// Export encoding failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// I/O error while writing exports.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    /// Audio failures leave gaze-only recording usable.
    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            TrackerError::DeviceUnsupported | TrackerError::DeviceError(_)
        )
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Encode(err.to_string())
    }
}

impl From<csv::Error> for TrackerError {
    fn from(err: csv::Error) -> Self {
        TrackerError::Encode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
