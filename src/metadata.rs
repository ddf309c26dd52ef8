//! Embedded metadata synchronization.
//!
//! After a photo is written to disk, its title, description and keywords are
//! overwritten with the values the hosting service holds. The image codec
//! work is delegated to a `MetadataWriter`; the default implementation shells
//! out to `exiftool`, which rewrites the metadata blocks in place without
//! re-encoding pixel data.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

use crate::api::Photo;

/// The fields written into a photo file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

impl PhotoMetadata {
    pub fn from_photo(photo: &Photo) -> Self {
        Self {
            title: photo.title.as_text().unwrap_or_default(),
            description: photo.description.as_text().unwrap_or_default(),
            keywords: photo.keywords(),
        }
    }
}

/// Writes metadata into an image file in place
#[async_trait]
pub trait MetadataWriter: Send + Sync {
    async fn write(&self, path: &Path, metadata: &PhotoMetadata) -> Result<()>;
}

/// `MetadataWriter` backed by the `exiftool` command line tool
pub struct ExiftoolWriter {
    program: PathBuf,
}

impl Default for ExiftoolWriter {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

impl ExiftoolWriter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn arguments(path: &Path, metadata: &PhotoMetadata) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-overwrite_original".into(),
            "-charset".into(),
            "iptc=UTF8".into(),
            format!("-Title={}", metadata.title).into(),
            format!("-Comment={}", metadata.description).into(),
        ];

        // A bare assignment clears the list; each further one adds an entry
        if metadata.keywords.is_empty() {
            args.push("-Keywords=".into());
        } else {
            args.extend(
                metadata
                    .keywords
                    .iter()
                    .map(|keyword| OsString::from(format!("-Keywords={keyword}"))),
            );
        }

        args.push(path.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl MetadataWriter for ExiftoolWriter {
    async fn write(&self, path: &Path, metadata: &PhotoMetadata) -> Result<()> {
        let output = Command::new(&self.program)
            .args(Self::arguments(path, metadata))
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }
}

/// Applies a photo's remote fields onto its downloaded file
#[derive(Clone)]
pub struct MetadataSynchronizer {
    writer: Arc<dyn MetadataWriter>,
}

impl MetadataSynchronizer {
    pub fn new(writer: Arc<dyn MetadataWriter>) -> Self {
        Self { writer }
    }

    pub async fn sync(&self, path: &Path, photo: &Photo) -> Result<PhotoMetadata> {
        let metadata = PhotoMetadata::from_photo(photo);

        self.writer
            .write(path, &metadata)
            .await
            .with_context(|| format!("Failed to write metadata to {}", path.display()))?;

        debug!(
            "{}: title={:?} comment={:?} keywords={:?}",
            path.display(),
            metadata.title,
            metadata.description,
            metadata.keywords
        );

        Ok(metadata)
    }
}
