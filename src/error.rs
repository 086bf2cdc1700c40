use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArimaError {
    #[error("parameter length mismatch: expected {expected}, got {got}")]
    ParamLengthMismatch { expected: usize, got: usize },

    #[error("state space construction failed: {0}")]
    StateSpaceError(String),

    #[error("optimization failed: {0}")]
    OptimizationFailed(String),

    #[error("data error: {0}")]
    DataError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("rendering failed: {0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArimaError>;
