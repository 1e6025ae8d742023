/// Result alias that carries the custom [`PulseError`] type.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Common error type for the core crate.
///
/// The estimator itself never fails; these variants cover the edges of the
/// crate (configuration, recorded input and FFT plumbing).
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Input handed to the crate did not satisfy a documented precondition.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Configuration parsed correctly but holds an unusable value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Error raised by the FFT backend.
    #[error("fft failure: {0}")]
    Fft(#[from] realfft::FftError),
}

impl From<String> for PulseError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
