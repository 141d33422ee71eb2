// Unix domain socket bindings for the framed stream transport.

use super::{InboundEnvelopes, StreamConfig, StreamTransport};
use crate::errors::TransportError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

/// Listening side of the socket. Each accepted connection becomes one
/// transport; the listener removes its socket file when dropped.
#[derive(Debug)]
pub struct UnixEndpoint {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixEndpoint {
    /// Binds `path`, replacing a stale socket file left by an earlier run.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();

        if path.exists() {
            warn!("IPC socket file already exists, removing: {:?}", path);
            tokio::fs::remove_file(path).await?;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let listener = UnixListener::bind(path)?;
        info!("Listening on IPC socket {:?}", path);
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next peer.
    pub async fn accept(
        &self,
        config: StreamConfig,
    ) -> Result<(StreamTransport, InboundEnvelopes), TransportError> {
        let (stream, _addr) = self.listener.accept().await?;
        info!("Accepted new IPC connection");
        Ok(from_stream(stream, config))
    }
}

impl Drop for UnixEndpoint {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(error = %e, "Failed to remove IPC socket file {:?}", self.path);
        }
    }
}

/// Connects to a listening peer, retrying while the socket is not up yet.
pub async fn connect(
    path: impl AsRef<Path>,
    attempts: u32,
    retry_delay: Duration,
    config: StreamConfig,
) -> Result<(StreamTransport, InboundEnvelopes), TransportError> {
    let path = path.as_ref();
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match UnixStream::connect(path).await {
            Ok(stream) => {
                info!(attempt, "Connected to IPC socket {:?}", path);
                return Ok(from_stream(stream, config));
            }
            Err(e) => {
                warn!(
                    attempt,
                    error = %e,
                    "Failed to connect to IPC socket {:?}",
                    path
                );
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    Err(TransportError::ConnectionFailed {
        path: path.to_path_buf(),
        attempts,
        source: last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                "Connection attempt failed without error",
            )
        }),
    })
}

fn from_stream(stream: UnixStream, config: StreamConfig) -> (StreamTransport, InboundEnvelopes) {
    let (reader, writer) = stream.into_split();
    StreamTransport::new(reader, writer, config)
}
