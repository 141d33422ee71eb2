use crate::envelope::CorrelationId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures of the underlying channel
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error on transport: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Failed to connect to {} after {attempts} attempts: {source}", path.display())]
    ConnectionFailed {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport channel closed")]
    Closed,
}

/// Failures surfaced to callers of the message bus.
///
/// A peer that never answers is not an error: `send` simply stays pending.
#[derive(Error, Debug)]
pub enum BusError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Message bus closed before a reply arrived")]
    Closed,

    #[error("No reply to request {id} within {after:?}")]
    Timeout { id: CorrelationId, after: Duration },

    #[error("Correlation id {0} is already pending")]
    DuplicateId(CorrelationId),
}
