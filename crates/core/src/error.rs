use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TetherError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, TetherError>;
