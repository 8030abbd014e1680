use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
///
/// Internals use `anyhow` for context chains; everything that crosses the public API is
/// flattened into this type so the binary can turn it into a single `error` event.
#[derive(Debug, Error)]
pub enum Error {
    /// The audio path handed to us does not exist on disk.
    ///
    /// The display string is part of the output protocol; the parent process matches on it.
    #[error("File not found")]
    FileNotFound(PathBuf),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_displays_protocol_message() {
        let err = Error::FileNotFound(PathBuf::from("/nope/meeting.m4a"));
        assert_eq!(err.to_string(), "File not found");
    }

    #[test]
    fn anyhow_chain_is_flattened() {
        let err = anyhow::anyhow!("inner cause").context("failed to load model");
        let err = Error::from(err);
        assert_eq!(err.to_string(), "failed to load model: inner cause");
    }
}
