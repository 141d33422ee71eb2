// Bindings between the message bus and a concrete channel.
// The bus only needs to push envelopes out and be handed the ones that come in.

mod channel;
mod stream;
pub mod unix;

pub use channel::ChannelTransport;
pub use stream::{StreamConfig, StreamTransport};

use crate::envelope::Envelope;
use crate::errors::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Inbound half of a transport, drained by the bus in arrival order.
pub type InboundEnvelopes = mpsc::Receiver<Envelope>;

/// Outbound half of the channel between the two processes.
///
/// Sending is fire-and-forget: success means the envelope was handed to the
/// channel, not that the peer received it.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send_envelope(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Human-readable transport name for logging
    fn name(&self) -> &'static str;
}
