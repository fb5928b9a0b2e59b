use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Failed to find directory '{}': {source}", path.display())]
    DirectoryNotFound {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Path '{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("Failed to open archive '{name}': {source}")]
    ArchiveOpen {
        name: String,
        source: zip::result::ZipError,
    },
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Enumeration of '{root}' failed: {reason}")]
    Enumeration { root: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AssetError>;
