use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Auth expired or missing permission")]
    AuthExpired,
    #[error("Config error: {0}")]
    Config(String),
    #[error("Label '{0}' not found")]
    LabelNotFound(String),
    /// The existing sheet contents could not be read, so nothing may be appended.
    #[error("Reading existing rows failed: {0}")]
    ExistingRows(String),
    #[error("Append of {attempted} row(s) ({first} .. {last}) failed: {reason}")]
    Append {
        attempted: usize,
        first: String,
        last: String,
        reason: String,
    },
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
