use crate::audio::{AudioConverter, CommandConverter};
use crate::handlers::{register_handlers, AudioSaveHandler, ReclistHandler};
use recboard_core::{RecBoardConfig, TransportSettings};
use recboard_ipc::unix::UnixEndpoint;
use recboard_ipc::{MessageBus, StreamConfig, TransportError};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument};

pub fn stream_config(settings: &TransportSettings) -> StreamConfig {
    StreamConfig {
        max_frame_len: settings.max_frame_len,
        inbound_capacity: settings.inbound_capacity,
    }
}

/// Binds the host socket and serves peers until Ctrl-C.
#[instrument(skip(config))]
pub async fn run_server(config: &RecBoardConfig, socket_path: &Path) -> Result<(), TransportError> {
    let endpoint = UnixEndpoint::bind(socket_path).await?;
    let converter = Arc::new(CommandConverter::ffmpeg(
        config.host.ffmpeg_path.clone(),
        config.host.sample_rate,
    ));
    info!(
        ffmpeg = %config.host.ffmpeg_path,
        reclist = ?config.host.reclist_path,
        "Host handlers configured"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl-C, shutting down");
    };

    serve(
        &endpoint,
        stream_config(&config.transport),
        ReclistHandler::new(config.host.reclist_path.clone()),
        AudioSaveHandler::new(converter),
        shutdown,
    )
    .await;
    Ok(())
}

/// Accepts peers one at a time: each connection gets its own bus with the
/// host handlers installed, and the next peer is accepted once it disconnects.
pub async fn serve<C, S>(
    endpoint: &UnixEndpoint,
    config: StreamConfig,
    reclist: ReclistHandler,
    audio: AudioSaveHandler<C>,
    shutdown: S,
) where
    C: AudioConverter,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            accepted = endpoint.accept(config) => accepted,
            _ = &mut shutdown => break,
        };
        let (transport, inbound) = match accepted {
            Ok(connection) => connection,
            Err(e) => {
                error!(error = %e, "Failed to accept IPC connection");
                continue;
            }
        };

        let bus = MessageBus::start(transport, inbound).await;
        register_handlers(&bus, reclist.clone(), audio.clone()).await;

        tokio::select! {
            _ = bus.closed() => info!("Peer disconnected, waiting for the next one"),
            _ = &mut shutdown => {
                bus.shutdown().await;
                break;
            }
        }
    }
}
