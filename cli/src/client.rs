use recboard_core::{
    reclist_from_reply, saved_from_reply, DetailError, LoadReclistRequest, ReclistEntry,
    SaveAudioRequest, TransportSettings, AUDIO_SAVE, RECLIST_LOAD,
};
use recboard_ipc::unix;
use recboard_ipc::{BusError, MessageBus, StreamConfig, StreamTransport, Transport, TransportError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not reach the RecBoard host: {0}")]
    Connect(#[from] TransportError),

    #[error("Request failed: {0}")]
    Bus(#[from] BusError),

    #[error("Could not encode request: {0}")]
    Detail(#[from] DetailError),
}

/// Typed requests to the RecBoard host over a message bus.
pub struct RecBoardClient<T: Transport> {
    bus: MessageBus<T>,
    timeout: Option<Duration>,
}

impl RecBoardClient<StreamTransport> {
    /// Connects to the host socket, retrying as configured, and starts the bus.
    pub async fn connect(
        socket_path: &Path,
        settings: &TransportSettings,
    ) -> Result<Self, ClientError> {
        let config = StreamConfig {
            max_frame_len: settings.max_frame_len,
            inbound_capacity: settings.inbound_capacity,
        };
        let (transport, inbound) = unix::connect(
            socket_path,
            settings.connect_retries,
            Duration::from_millis(settings.retry_delay_ms),
            config,
        )
        .await?;
        info!("Connected to RecBoard host at {}", socket_path.display());

        let bus = MessageBus::start(transport, inbound).await;
        Ok(Self::new(bus).with_timeout(settings.request_timeout_secs.map(Duration::from_secs)))
    }
}

impl<T: Transport> RecBoardClient<T> {
    pub fn new(bus: MessageBus<T>) -> Self {
        Self { bus, timeout: None }
    }

    /// Bounds every request; `None` waits for the reply indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bus(&self) -> &MessageBus<T> {
        &self.bus
    }

    async fn request(&self, kind: &str, detail: Value) -> Result<Value, ClientError> {
        let reply = match self.timeout {
            Some(deadline) => self.bus.send_timeout(kind, detail, deadline).await?,
            None => self.bus.send(kind, detail).await?,
        };
        debug!(kind, "Received reply");
        Ok(reply)
    }

    /// Asks the host for a reclist's entries. `None` uses the host's configured list.
    ///
    /// The host answers with an empty list when the reclist cannot be loaded.
    #[instrument(skip(self))]
    pub async fn load_reclist(
        &self,
        path: Option<PathBuf>,
    ) -> Result<Vec<ReclistEntry>, ClientError> {
        let detail = LoadReclistRequest { path }.into_detail();
        let reply = self.request(RECLIST_LOAD, detail).await?;
        Ok(reclist_from_reply(reply))
    }

    /// Sends a recorded take for conversion and storage at `path` on the host.
    /// Returns whether the host stored it.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn save_audio(
        &self,
        path: impl Into<PathBuf> + std::fmt::Debug,
        data: Vec<u8>,
    ) -> Result<bool, ClientError> {
        let detail = SaveAudioRequest::new(path, data).into_detail()?;
        let reply = self.request(AUDIO_SAVE, detail).await?;
        Ok(saved_from_reply(&reply))
    }

    pub async fn close(&self) {
        self.bus.shutdown().await;
    }
}
