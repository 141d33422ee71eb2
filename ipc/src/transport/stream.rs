use super::{InboundEnvelopes, Transport};
use crate::envelope::Envelope;
use crate::errors::TransportError;
use async_trait::async_trait;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// Big-endian u32 length prefix in front of every JSON body
const LENGTH_PREFIX_SIZE: usize = 4;

const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;
const DEFAULT_INBOUND_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Largest JSON body accepted in either direction
    pub max_frame_len: usize,
    /// Capacity of the queue between the reader task and the bus
    pub inbound_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

type BoxedWriter = BufWriter<Box<dyn AsyncWrite + Send + Unpin>>;

/// Envelopes framed over a byte stream (Unix socket, pipe, child stdio).
///
/// A background task reads frames and feeds the inbound queue; it stops on
/// EOF, on an IO error, or on a frame larger than `max_frame_len`. Frames
/// that do not decode as an envelope are skipped.
pub struct StreamTransport {
    writer: Mutex<BoxedWriter>,
    max_frame_len: usize,
    reader_task: JoinHandle<()>,
}

impl StreamTransport {
    pub fn new<R, W>(reader: R, writer: W, config: StreamConfig) -> (Self, InboundEnvelopes)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let reader_task = tokio::spawn(read_frames(
            BufReader::new(reader),
            inbound_tx,
            config.max_frame_len,
        ));
        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);

        let transport = Self {
            writer: Mutex::new(BufWriter::new(writer)),
            max_frame_len: config.max_frame_len,
            reader_task,
        };
        (transport, inbound_rx)
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send_envelope(&self, envelope: Envelope) -> Result<(), TransportError> {
        let frame = encode_frame(&envelope, self.max_frame_len)?;
        debug!(id = %envelope.id, kind = %envelope.kind, size = frame.len(), "Writing frame");

        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stream"
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Serializes an envelope into a length-prefixed frame
pub(crate) fn encode_frame(
    envelope: &Envelope,
    max_frame_len: usize,
) -> Result<Vec<u8>, TransportError> {
    let body = serde_json::to_vec(envelope)?;
    if body.len() > max_frame_len || body.len() > u32::MAX as usize {
        return Err(TransportError::FrameTooLarge {
            len: body.len(),
            max: max_frame_len,
        });
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

async fn read_frames<R>(mut reader: R, inbound: mpsc::Sender<Envelope>, max_frame_len: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();

    loop {
        let length = match reader.read_u32().await {
            Ok(len) => len as usize,
            Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => {
                info!("Connection closed by peer.");
                break;
            }
            Err(e) => {
                error!(error = %e, "Failed to read frame length");
                break;
            }
        };

        if length == 0 {
            warn!("Received zero-length frame, ignoring.");
            continue;
        }
        if length > max_frame_len {
            error!(length, max_frame_len, "Frame exceeds size limit, closing connection");
            break;
        }

        buffer.resize(length, 0);
        if let Err(e) = reader.read_exact(&mut buffer).await {
            error!(error = %e, "Failed to read frame body");
            break;
        }

        let envelope: Envelope = match serde_json::from_slice(&buffer) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Skipping frame that is not a valid envelope");
                continue;
            }
        };

        if inbound.send(envelope).await.is_err() {
            debug!("Inbound queue dropped, stopping reader");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::duplex;

    type Endpoint = (StreamTransport, InboundEnvelopes);

    fn stream_pair(config: StreamConfig) -> (Endpoint, Endpoint) {
        let (a, b) = duplex(1024);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        (
            StreamTransport::new(a_read, a_write, config),
            StreamTransport::new(b_read, b_write, config),
        )
    }

    #[test]
    fn test_frame_layout() {
        let envelope = Envelope::new("x".into(), "t", json!(1));
        let frame = encode_frame(&envelope, 1024).unwrap();
        let body = serde_json::to_vec(&envelope).unwrap();

        assert_eq!(&frame[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], body.as_slice());
    }

    #[test]
    fn test_oversize_frame_rejected() {
        let envelope = Envelope::new("x".into(), "t", json!("a".repeat(64)));
        assert!(matches!(
            encode_frame(&envelope, 16),
            Err(TransportError::FrameTooLarge { max: 16, .. })
        ));
    }

    #[tokio::test]
    async fn test_envelopes_cross_the_stream() {
        let ((a, _a_inbound), (_b, mut b_inbound)) = stream_pair(StreamConfig::default());

        let first = Envelope::new("1".into(), "audio:save", json!({ "path": "/tmp/x.wav" }));
        let second = Envelope::new("2".into(), "reclist:load", json!(null));
        a.send_envelope(first.clone()).await.unwrap();
        a.send_envelope(second.clone()).await.unwrap();

        assert_eq!(b_inbound.recv().await.unwrap(), first);
        assert_eq!(b_inbound.recv().await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_garbage_frames_are_skipped() {
        let (raw, peer) = duplex(1024);
        let (peer_read, peer_write) = tokio::io::split(peer);
        let (_transport, mut inbound) =
            StreamTransport::new(peer_read, peer_write, StreamConfig::default());

        let (_raw_read, mut raw_write) = tokio::io::split(raw);
        let garbage = b"not json";
        raw_write.write_u32(garbage.len() as u32).await.unwrap();
        raw_write.write_all(garbage).await.unwrap();
        let good = encode_frame(&Envelope::new("ok".into(), "t", json!(true)), 1024).unwrap();
        raw_write.write_all(&good).await.unwrap();
        raw_write.flush().await.unwrap();

        let received = inbound.recv().await.unwrap();
        assert_eq!(received.id.as_str(), "ok");
    }

    #[tokio::test]
    async fn test_eof_ends_inbound() {
        let (raw, peer) = duplex(64);
        let (peer_read, peer_write) = tokio::io::split(peer);
        let (_transport, mut inbound) =
            StreamTransport::new(peer_read, peer_write, StreamConfig::default());

        drop(raw);
        assert!(inbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_oversize_inbound_frame_closes_stream() {
        let (raw, peer) = duplex(1024);
        let (peer_read, peer_write) = tokio::io::split(peer);
        let config = StreamConfig {
            max_frame_len: 8,
            ..StreamConfig::default()
        };
        let (_transport, mut inbound) = StreamTransport::new(peer_read, peer_write, config);

        let (_raw_read, mut raw_write) = tokio::io::split(raw);
        raw_write.write_u32(1_000).await.unwrap();
        raw_write.flush().await.unwrap();

        assert!(inbound.recv().await.is_none());
    }
}
