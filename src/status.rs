//! Inspection of an existing local archive.
//!
//! Reads the `album.json` manifests under the output directory without
//! touching the network. Directories without a manifest are reported
//! separately: the archiver treats any existing album directory as finished,
//! so an interrupted album shows up here and has to be removed by hand to be
//! fetched again.

use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ArchiveManifest;

/// An album with a readable manifest
#[derive(Debug, Clone)]
pub struct ArchivedAlbum {
    pub name: String,
    pub path: PathBuf,
    pub photo_count: usize,
    pub declared_count: u64,
}

#[derive(Debug, Default)]
pub struct ArchiveStatus {
    pub albums: Vec<ArchivedAlbum>,
    /// Directories holding no readable `album.json`
    pub without_manifest: Vec<PathBuf>,
}

impl ArchiveStatus {
    pub fn photo_count(&self) -> usize {
        self.albums.iter().map(|a| a.photo_count).sum()
    }
}

/// Scans the immediate subdirectories of `out_dir`, sorted by name
pub fn scan_archive(out_dir: &Path) -> Result<ArchiveStatus> {
    let mut status = ArchiveStatus::default();
    if !out_dir.exists() {
        return Ok(status);
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(out_dir)
        .with_context(|| format!("Failed to read {}", out_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let manifest_path = dir.join(ArchiveManifest::FILE_NAME);
        if !manifest_path.exists() {
            status.without_manifest.push(dir);
            continue;
        }

        match read_manifest(&manifest_path) {
            Ok(manifest) => status.albums.push(ArchivedAlbum {
                name: manifest.album.directory_name().to_string(),
                path: dir,
                photo_count: manifest.photos.len(),
                declared_count: manifest.album.declared_count,
            }),
            Err(e) => {
                warn!("{e:#}");
                status.without_manifest.push(dir);
            }
        }
    }

    Ok(status)
}

fn read_manifest(path: &Path) -> Result<ArchiveManifest> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}
