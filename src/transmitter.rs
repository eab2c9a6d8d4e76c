use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::info;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::TransmissionError;
use crate::segment;

/// The subsystem that actually puts messages on the carrier network.
#[async_trait]
pub trait Transmitter: Send + Sync {
    async fn send_text(&self, phone_number: &str, message: &str) -> Result<(), TransmissionError>;

    async fn send_multipart(
        &self,
        phone_number: &str,
        parts: Vec<String>,
    ) -> Result<(), TransmissionError>;

    async fn send_media(
        &self,
        phone_number: &str,
        message: &str,
        attachments: &[PathBuf],
    ) -> Result<(), TransmissionError>;

    fn divide_message(&self, message: &str) -> Vec<String> {
        segment::divide_message(message)
    }
}

/// Hands each send to an external program, e.g. a wrapper around the modem
/// daemon. The program is called as `<program> <text|multipart|media>
/// <phoneNumber>` with a JSON document on stdin; a non-zero exit fails the
/// send with its stderr as the detail.
pub struct CommandTransmitter {
    program: PathBuf,
}

impl CommandTransmitter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, mode: &str, phone_number: &str, input: Value) -> Result<(), TransmissionError> {
        let mut child = Command::new(&self.program)
            .arg(mode)
            .arg(phone_number)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransmissionError::new(format!(
                    "failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let write = stdin.write_all(input.to_string().as_bytes()).await;
            match write {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(TransmissionError::new(format!(
                        "failed to write to {}: {}",
                        self.program.display(),
                        e
                    )));
                }
                _ => {}
            }
        }

        let output = child.wait_with_output().await.map_err(|e| {
            TransmissionError::new(format!("failed to wait for {}: {}", self.program.display(), e))
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Err(TransmissionError::new(format!(
                "{} exited with {}",
                self.program.display(),
                output.status
            )))
        } else {
            Err(TransmissionError(stderr))
        }
    }
}

#[async_trait]
impl Transmitter for CommandTransmitter {
    async fn send_text(&self, phone_number: &str, message: &str) -> Result<(), TransmissionError> {
        self.run("text", phone_number, json!({ "message": message }))
            .await
    }

    async fn send_multipart(
        &self,
        phone_number: &str,
        parts: Vec<String>,
    ) -> Result<(), TransmissionError> {
        self.run("multipart", phone_number, json!({ "parts": parts }))
            .await
    }

    async fn send_media(
        &self,
        phone_number: &str,
        message: &str,
        attachments: &[PathBuf],
    ) -> Result<(), TransmissionError> {
        let attachments: Vec<String> = attachments.iter().map(|p| display_path(p)).collect();
        self.run(
            "media",
            phone_number,
            json!({ "message": message, "attachments": attachments }),
        )
        .await
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Logs sends instead of transmitting them. Used when no sender program is
/// configured.
pub struct DryRunTransmitter;

#[async_trait]
impl Transmitter for DryRunTransmitter {
    async fn send_text(&self, phone_number: &str, message: &str) -> Result<(), TransmissionError> {
        info!("[dry-run] text to {} ({} chars)", phone_number, message.chars().count());
        Ok(())
    }

    async fn send_multipart(
        &self,
        phone_number: &str,
        parts: Vec<String>,
    ) -> Result<(), TransmissionError> {
        info!("[dry-run] multipart text to {} ({} parts)", phone_number, parts.len());
        Ok(())
    }

    async fn send_media(
        &self,
        phone_number: &str,
        _message: &str,
        attachments: &[PathBuf],
    ) -> Result<(), TransmissionError> {
        info!(
            "[dry-run] media to {} ({} attachments)",
            phone_number,
            attachments.len()
        );
        Ok(())
    }
}
