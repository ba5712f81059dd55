use crate::utils::output::OutputStyle;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// The file exists but could not be read or written.
    #[error("Config IO error: {0}")]
    ConfigIo(String),

    /// The document is malformed. Callers treat this the same as a missing file.
    #[error("Config parse failure: {0}")]
    ConfigParse(String),

    #[error("Instance error: {0}")]
    Instance(String),

    #[error("Forwarding timed out after {0} ms")]
    ForwardingTimeout(u64),

    #[error("System error: {0}")]
    System(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

/// Result type alias for consistent error handling across the application
pub type AppResult<T> = Result<T, AppError>;

pub fn report_error(err: &AppError) {
    match err {
        AppError::ConfigIo(msg) | AppError::ConfigParse(msg) => {
            eprintln!("⚙️  {}", OutputStyle::warning(&format!("Config: {}", msg)));
        }
        AppError::Instance(msg) => {
            eprintln!("🔒 {}", OutputStyle::error(&format!("Instance: {}", msg)));
        }
        AppError::ForwardingTimeout(ms) => {
            eprintln!(
                "⏱️  {}",
                OutputStyle::muted(&format!("Running instance did not answer within {} ms", ms))
            );
        }
        AppError::Io(e) => {
            eprintln!("❌ {}", OutputStyle::error(e));
        }
        AppError::System(msg) => {
            eprintln!("❌ {}", OutputStyle::error(msg));
        }
    }
}
