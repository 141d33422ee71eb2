use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use recboard_ipc::Transport;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::client::RecBoardClient;
use crate::output::{print_entries, print_saved};

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Loads a reclist through the host and prints its entries
pub async fn run_load<T: Transport>(
    client: &RecBoardClient<T>,
    reclist: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    info!(?reclist, "Requesting reclist");
    let entries = client
        .load_reclist(reclist)
        .await
        .context("Failed to load reclist from the host")?;
    print_entries(&entries, json);
    Ok(())
}

/// Sends the contents of `input` to the host to be stored at `path`
pub async fn run_save<T: Transport>(
    client: &RecBoardClient<T>,
    path: &Path,
    input: &Path,
) -> Result<()> {
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read recording {}", input.display()))?;
    info!(bytes = data.len(), "Sending take to {}", path.display());

    let spinner = spinner("Converting and saving...");
    let result = client.save_audio(path, data).await;
    spinner.finish_and_clear();

    let saved = result.context("Failed to send audio to the host")?;
    print_saved(path, saved);
    if !saved {
        bail!("The host could not save {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recboard_core::AUDIO_SAVE;
    use recboard_ipc::{ChannelTransport, MessageBus, Reply};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    async fn client_with_save_result(
        saved: bool,
    ) -> (RecBoardClient<ChannelTransport>, MessageBus<ChannelTransport>) {
        let ((client, client_inbound), (host, host_inbound)) = ChannelTransport::pair(8);
        let host = MessageBus::start(host, host_inbound).await;
        host.on(AUDIO_SAVE, move |_detail: Value, reply: Reply| async move {
            let _ = reply.send(json!(saved)).await;
        })
        .await;
        (
            RecBoardClient::new(MessageBus::start(client, client_inbound).await),
            host,
        )
    }

    #[tokio::test]
    async fn test_save_succeeds() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("take.webm");
        std::fs::write(&input, b"take").unwrap();

        let (client, _host) = client_with_save_result(true).await;
        run_save(&client, Path::new("/tmp/a.wav"), &input)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_save_rejected_by_host_is_an_error() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("take.webm");
        std::fs::write(&input, b"take").unwrap();

        let (client, _host) = client_with_save_result(false).await;
        assert!(run_save(&client, Path::new("/tmp/a.wav"), &input).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let dir = tempdir().unwrap();
        let (client, _host) = client_with_save_result(true).await;

        let result = run_save(&client, Path::new("/tmp/a.wav"), &dir.path().join("none")).await;
        assert!(result.is_err());
        assert_eq!(client.bus().pending_count().await, 0);
    }
}
