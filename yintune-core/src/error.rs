use thiserror::Error;

/// Errors from note name and tuning reference handling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TuningError {
    /// The name is not one of the twelve chromatic pitch classes.
    #[error("invalid note name: {0:?}")]
    InvalidNoteName(String),

    /// The octave part of a note label could not be parsed.
    #[error("invalid octave in note label: {0:?}")]
    InvalidOctave(String),

    /// The A4 reference must be a finite, positive frequency.
    #[error("invalid tuning reference: {0} Hz")]
    InvalidReference(f32),
}

/// Errors raised when validating a [`crate::config::TunerConfig`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be positive")]
    ZeroSampleRate,

    #[error("{name} must be positive")]
    ZeroSize { name: &'static str },

    #[error("frequency bounds must satisfy 0 < fmin < fmax (got fmin={f_min}, fmax={f_max})")]
    FrequencyBounds { f_min: f32, f_max: f32 },

    #[error("YIN threshold must lie in (0, 1), got {0}")]
    Threshold(f32),

    #[error("confidence threshold must lie in [0, 1], got {0}")]
    ConfidenceThreshold(f32),

    #[error("{name} must be finite and non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error(transparent)]
    Tuning(#[from] TuningError),
}
