use crate::audio::{save_audio, AudioConverter};
use crate::errors::HandlerError;
use crate::reclist::load_reclist;
use async_trait::async_trait;
use recboard_core::{LoadReclistRequest, ReclistEntry, SaveAudioRequest, AUDIO_SAVE, RECLIST_LOAD};
use recboard_ipc::{Handler, MessageBus, Reply, Transport};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Answers `reclist:load` with the parsed entries, or an empty list on any failure.
#[derive(Debug, Clone, Default)]
pub struct ReclistHandler {
    default_path: Option<PathBuf>,
}

impl ReclistHandler {
    pub fn new(default_path: Option<PathBuf>) -> Self {
        Self { default_path }
    }

    async fn load(&self, detail: Value) -> Result<Vec<ReclistEntry>, HandlerError> {
        let request = LoadReclistRequest::from_detail(detail)?;
        let path = request
            .path
            .or_else(|| self.default_path.clone())
            .ok_or(HandlerError::NoReclist)?;
        load_reclist(&path).await
    }
}

#[async_trait]
impl Handler for ReclistHandler {
    async fn handle(&self, detail: Value, reply: Reply) {
        debug!(id = %reply.id(), kind = reply.kind(), "Handling request");
        let entries = match self.load(detail).await {
            Ok(entries) => {
                info!(count = entries.len(), "Loaded reclist");
                entries
            }
            Err(e) => {
                error!(error = %e, "Failed to load reclist");
                Vec::new()
            }
        };

        if let Err(e) = reply.send(json!(entries)).await {
            warn!(error = %e, "Failed to send reclist reply");
        }
    }
}

/// Answers `audio:save` with `true` once the converted take is on disk, `false` otherwise.
pub struct AudioSaveHandler<C> {
    converter: Arc<C>,
}

impl<C: AudioConverter> AudioSaveHandler<C> {
    pub fn new(converter: Arc<C>) -> Self {
        Self { converter }
    }
}

impl<C> Clone for AudioSaveHandler<C> {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
        }
    }
}

#[async_trait]
impl<C: AudioConverter> Handler for AudioSaveHandler<C> {
    async fn handle(&self, detail: Value, reply: Reply) {
        debug!(id = %reply.id(), kind = reply.kind(), "Handling request");
        let saved = match SaveAudioRequest::from_detail(detail) {
            Ok(request) => {
                let path = request.path.clone();
                match save_audio(self.converter.as_ref(), request).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "Failed to save audio");
                        false
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Rejected audio:save request");
                false
            }
        };

        if let Err(e) = reply.send(Value::Bool(saved)).await {
            warn!(error = %e, "Failed to send audio:save reply");
        }
    }
}

/// Installs the host's handlers on a freshly started bus.
pub async fn register_handlers<T, C>(
    bus: &MessageBus<T>,
    reclist: ReclistHandler,
    audio: AudioSaveHandler<C>,
) where
    T: Transport,
    C: AudioConverter,
{
    bus.on(RECLIST_LOAD, reclist).await;
    bus.on(AUDIO_SAVE, audio).await;
}
