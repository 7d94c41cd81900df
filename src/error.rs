use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContinuumError>;

#[derive(Debug, Error)]
pub enum ContinuumError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("fit failed for {unit}: {reason}")]
    FitConvergence { unit: String, reason: String },

    #[error("data error: {0}")]
    Data(String),

    #[error("missing header key {0}")]
    MissingHeaderKey(String),
}

impl ContinuumError {
    pub fn fit(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FitConvergence {
            unit: unit.into(),
            reason: reason.into(),
        }
    }
}
