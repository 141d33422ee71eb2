use recboard_core::DetailError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures inside the host's request handlers. They never cross the wire:
/// handlers log them and answer with an empty list or `false`.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("No reclist path in the request and none configured")]
    NoReclist,

    #[error("Reclist path is not a file: {0}")]
    NotAFile(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reclist is not valid UTF-8: {0}")]
    NotUtf8(PathBuf),

    #[error("Invalid request detail: {0}")]
    Detail(#[from] DetailError),

    #[error("Failed to start converter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter exited with {status}: {stderr}")]
    ConverterFailed { status: String, stderr: String },

    #[error("Converter I/O error: {0}")]
    ConverterIo(#[from] std::io::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
