use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColvaultError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Config(ConfigError),
    #[error("archive {0}")]
    Archive(String),
    #[error("not enough free space: need {required} bytes, {} available", fmt_available(.available))]
    OutOfSpace {
        required: u64,
        available: Option<u64>,
    },
    #[error("not a backup file: {}", .0.display())]
    NotABackup(PathBuf),
    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(String),
    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ColvaultError>;

impl ColvaultError {
    pub fn message(msg: impl Into<String>) -> Self {
        ColvaultError::Message(msg.into())
    }
}

impl From<ConfigError> for ColvaultError {
    fn from(err: ConfigError) -> Self {
        ColvaultError::Config(err)
    }
}

impl From<zip::result::ZipError> for ColvaultError {
    fn from(err: zip::result::ZipError) -> Self {
        ColvaultError::Archive(err.to_string())
    }
}

fn fmt_available(available: &Option<u64>) -> String {
    match available {
        Some(bytes) => bytes.to_string(),
        None => "unknown".to_string(),
    }
}
