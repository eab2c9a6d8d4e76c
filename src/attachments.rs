use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AttachmentError;

/// Standard alphabet; trailing `=` padding may be present or left off.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Writes decoded attachments into a staging directory.
#[derive(Debug, Clone)]
pub struct AttachmentStager {
    dir: PathBuf,
}

impl AttachmentStager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Opens a staging scope for one request. Everything staged through it is
    /// deleted when the scope is dropped.
    pub fn scope(&self) -> StagingScope<'_> {
        StagingScope {
            stager: self,
            tag: Uuid::new_v4(),
            staged: Vec::new(),
        }
    }

    async fn stage(
        &self,
        tag: &Uuid,
        data: &str,
        index: usize,
    ) -> Result<StagedAttachment, AttachmentError> {
        let bytes = LENIENT_STANDARD
            .decode(data)
            .map_err(|source| AttachmentError::Decode { index, source })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| AttachmentError::Io { index, source })?;

        let path = self
            .dir
            .join(format!("mms_{}_{}.{}", tag.simple(), index, sniff_extension(&bytes)));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| AttachmentError::Io { index, source })?;

        debug!("Staged attachment {} ({} bytes) at {}", index, bytes.len(), path.display());
        Ok(StagedAttachment { path: Some(path) })
    }
}

pub struct StagingScope<'a> {
    stager: &'a AttachmentStager,
    tag: Uuid,
    staged: Vec<StagedAttachment>,
}

impl StagingScope<'_> {
    pub async fn stage(&mut self, data: &Value, index: usize) -> Result<&StagedAttachment, AttachmentError> {
        let data = data.as_str().ok_or(AttachmentError::NotAString { index })?;
        let attachment = self.stager.stage(&self.tag, data, index).await?;
        self.staged.push(attachment);
        Ok(&self.staged[self.staged.len() - 1])
    }

    /// Paths of the staged files in staging order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.staged
            .iter()
            .filter_map(|a| a.path().map(Path::to_path_buf))
            .collect()
    }

    pub fn release_all(&mut self) {
        for attachment in &mut self.staged {
            attachment.release();
        }
    }
}

impl Drop for StagingScope<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Owns one staged file until released.
#[derive(Debug)]
pub struct StagedAttachment {
    path: Option<PathBuf>,
}

impl StagedAttachment {
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Deletes the backing file. Calling it again is a no-op.
    pub fn release(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        // Sync on purpose: this also runs from Drop, which cannot await.
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed staged attachment {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged attachment {}: {}", path.display(), e),
        }
    }
}

impl Drop for StagedAttachment {
    fn drop(&mut self) {
        self.release();
    }
}

fn sniff_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "png"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "gif"
    } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        "mp4"
    } else {
        "bin"
    }
}
