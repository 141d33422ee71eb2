use crate::errors::HandlerError;
use async_trait::async_trait;
use recboard_core::SaveAudioRequest;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Turns recorded audio into the bytes that get written to disk.
#[async_trait]
pub trait AudioConverter: Send + Sync + 'static {
    async fn convert(&self, input: Vec<u8>) -> Result<Vec<u8>, HandlerError>;
}

/// Converter backed by an external program that reads stdin and writes stdout.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// ffmpeg producing mono 32-bit float wav at `sample_rate`
    pub fn ffmpeg(program: impl Into<String>, sample_rate: u32) -> Self {
        let args = [
            "-i",
            "pipe:0",
            "-vn",
            "-ac",
            "1",
            "-ar",
            &sample_rate.to_string(),
            "-acodec",
            "pcm_f32le",
            "-f",
            "wav",
            "pipe:1",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        Self::new(program, args)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl AudioConverter for CommandConverter {
    async fn convert(&self, input: Vec<u8>) -> Result<Vec<u8>, HandlerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HandlerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Fed from its own task so a full stdout pipe cannot stall the write.
        let mut stdin = child.stdin.take().ok_or_else(|| {
            HandlerError::ConverterIo(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "converter stdin unavailable",
            ))
        })?;
        let input_len = input.len();
        let feeder = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        match feeder.await {
            Ok(Ok(())) => debug!(bytes = input_len, "Fed converter input"),
            Ok(Err(e)) => warn!(error = %e, "Converter stopped reading its input"),
            Err(e) => warn!(error = %e, "Converter input task failed"),
        }

        if !output.status.success() {
            return Err(HandlerError::ConverterFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

/// Converts the take and writes it to the requested path.
pub async fn save_audio<C: AudioConverter + ?Sized>(
    converter: &C,
    request: SaveAudioRequest,
) -> Result<(), HandlerError> {
    let SaveAudioRequest { path, data } = request;
    let converted = converter.convert(data).await?;

    tokio::fs::write(&path, &converted)
        .await
        .map_err(|source| HandlerError::Write {
            path: path.clone(),
            source,
        })?;
    info!(path = %path.display(), bytes = converted.len(), "Saved audio");
    Ok(())
}
