use thiserror::Error;

pub type MocResult<T> = Result<T, MocError>;

#[derive(Debug, Error)]
pub enum MocError {
    #[error("config error: {0}")]
    Config(String),

    #[error("key file error: {0}")]
    KeyFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
