// This crate centralizes the messaging layer shared by both RecBoard processes:
// - Wire envelope and correlation identifiers
// - Pending-request bookkeeping and reply wakeups
// - Handler registration for unsolicited requests
// - Transport bindings (in-process channels, framed streams, Unix sockets)

pub mod bus;
pub mod correlation;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod transport;

pub use bus::{Dispatch, MessageBus};
pub use correlation::CorrelationRegistry;
pub use envelope::{CorrelationId, Envelope};
pub use errors::{BusError, TransportError};
pub use handlers::{Handler, Reply};
pub use transport::{
    unix, ChannelTransport, InboundEnvelopes, StreamConfig, StreamTransport, Transport,
};
