use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tfs_protocol::ProtocolError;
use tfs_transform::TransformError;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to read configuration file {path:?}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Syntax error in configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Service '{name}' is already running on {path:?}")]
    AlreadyRunning { name: String, path: PathBuf },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
