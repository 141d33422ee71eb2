use super::{InboundEnvelopes, Transport};
use crate::envelope::Envelope;
use crate::errors::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// In-process transport: one end of a linked pair of queues.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    peer: mpsc::Sender<Envelope>,
}

impl ChannelTransport {
    /// Creates two linked endpoints. Whatever one side sends arrives on the
    /// other side's inbound queue.
    pub fn pair(
        capacity: usize,
    ) -> (
        (ChannelTransport, InboundEnvelopes),
        (ChannelTransport, InboundEnvelopes),
    ) {
        let (to_a, a_inbound) = mpsc::channel(capacity);
        let (to_b, b_inbound) = mpsc::channel(capacity);
        (
            (ChannelTransport { peer: to_b }, a_inbound),
            (ChannelTransport { peer: to_a }, b_inbound),
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send_envelope(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.peer
            .send(envelope)
            .await
            .map_err(|_| TransportError::Closed)
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}
