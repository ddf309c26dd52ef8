//! Top-level archival driver.
//!
//! Albums are processed one at a time, in listing order. For each album:
//!
//! - if `<out_dir>/<album name>` already exists the album is skipped without
//!   any network traffic;
//! - otherwise its photos are listed page by page, each page is downloaded
//!   before the next one is requested, and finally `album.json` is written
//!   with the album record and every listed photo.
//!
//! A failure while listing or writing an album abandons that album only and
//! leaves no manifest behind. The directory check is the only resume state:
//! an album abandoned before any photo was written is fetched again in full
//! on the next run, but one abandoned after its directory appeared is skipped
//! from then on. `status` lists such directories.

use anyhow::{Context, Result, bail};
use log::{debug, error, info};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as tokio_fs;

use crate::api::{Album, ApiClient, ArchiveManifest};
use crate::config::Config;
use crate::downloader::{ConcurrentDownloader, HttpFetcher};
use crate::metadata::{ExiftoolWriter, MetadataSynchronizer};
use crate::paginator::AlbumPaginator;
use crate::trovebox::TroveboxClient;

/// Run settings threaded explicitly through the pipeline
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub out_dir: PathBuf,
    pub page_size: u32,
    pub max_pages: u32,
}

impl ArchiveOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            out_dir: config.out_dir.clone(),
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }
}

/// Lifecycle of one album within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumState {
    Pending,
    Skipped,
    Listing,
    Downloading,
    Manifesting,
    Done,
    Failed,
}

impl fmt::Display for AlbumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlbumState::Pending => "pending",
            AlbumState::Skipped => "skipped",
            AlbumState::Listing => "listing",
            AlbumState::Downloading => "downloading",
            AlbumState::Manifesting => "manifesting",
            AlbumState::Done => "done",
            AlbumState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// How an album ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumOutcome {
    /// Its directory already existed
    Skipped,
    /// Manifest written
    Done {
        photos: usize,
        saved: usize,
        metadata_failures: usize,
        failures: usize,
    },
    /// Abandoned; no manifest written
    Failed(String),
}

impl AlbumOutcome {
    pub fn state(&self) -> AlbumState {
        match self {
            AlbumOutcome::Skipped => AlbumState::Skipped,
            AlbumOutcome::Done { .. } => AlbumState::Done,
            AlbumOutcome::Failed(_) => AlbumState::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlbumResult {
    pub name: String,
    pub outcome: AlbumOutcome,
}

/// Per-album results of a run, in listing order
#[derive(Debug, Default)]
pub struct ArchiveSummary {
    pub albums: Vec<AlbumResult>,
}

impl ArchiveSummary {
    pub fn count(&self, state: AlbumState) -> usize {
        self.albums
            .iter()
            .filter(|a| a.outcome.state() == state)
            .count()
    }

    pub fn photos_saved(&self) -> usize {
        self.albums
            .iter()
            .map(|a| match a.outcome {
                AlbumOutcome::Done {
                    saved,
                    metadata_failures,
                    ..
                } => saved + metadata_failures,
                _ => 0,
            })
            .sum()
    }

    pub fn photo_failures(&self) -> usize {
        self.albums
            .iter()
            .map(|a| match a.outcome {
                AlbumOutcome::Done { failures, .. } => failures,
                _ => 0,
            })
            .sum()
    }
}

pub struct Archiver {
    client: Arc<dyn ApiClient>,
    downloader: ConcurrentDownloader,
    options: ArchiveOptions,
}

impl Archiver {
    pub fn new(
        client: Arc<dyn ApiClient>,
        downloader: ConcurrentDownloader,
        options: ArchiveOptions,
    ) -> Self {
        Self {
            client,
            downloader,
            options,
        }
    }

    /// Wires the HTTP API client, HTTP fetcher and exiftool writer together
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(TroveboxClient::from_config(config)?);
        let synchronizer = MetadataSynchronizer::new(Arc::new(ExiftoolWriter::default()));
        let downloader = ConcurrentDownloader::new(Arc::new(HttpFetcher::default()), synchronizer);

        Ok(Self::new(client, downloader, ArchiveOptions::from_config(config)))
    }

    /// Archives every album of the account. Only a failure to list the
    /// albums themselves is returned as an error.
    pub async fn run(&self) -> Result<ArchiveSummary> {
        let albums = self.client.list_albums().await?;
        let total = albums.len();
        info!("Found {total} albums");

        let mut summary = ArchiveSummary::default();
        for (index, album) in albums.into_iter().enumerate() {
            let name = album.directory_name().to_string();
            let outcome = self.process_album(album, index + 1, total).await;
            summary.albums.push(AlbumResult { name, outcome });
        }

        Ok(summary)
    }

    async fn process_album(&self, album: Album, position: usize, total: usize) -> AlbumOutcome {
        let name = album.directory_name().to_string();
        Self::transition(&name, AlbumState::Pending);

        let album_dir = match self.album_dir(&album) {
            Ok(dir) => dir,
            Err(e) => {
                error!("Cannot archive album {} ({position}/{total}): {e:#}", album.id);
                return AlbumOutcome::Failed(format!("{e:#}"));
            }
        };

        let archived = tokio_fs::metadata(&album_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if archived {
            info!("Skipping album \"{name}\" ({position}/{total}): already archived");
            return AlbumOutcome::Skipped;
        }

        info!(
            "Processing album \"{name}\" ({position}/{total}, {} photos reported)",
            album.declared_count
        );

        match self.archive_album(album, &album_dir).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to archive album \"{name}\": {e:#}");
                Self::transition(&name, AlbumState::Failed);
                AlbumOutcome::Failed(format!("{e:#}"))
            }
        }
    }

    /// Lists, downloads and writes the manifest for one album into `album_dir`
    pub async fn archive_album(&self, album: Album, album_dir: &Path) -> Result<AlbumOutcome> {
        let name = album.directory_name().to_string();
        let mut paginator = AlbumPaginator::new(
            self.client.as_ref(),
            album.id.clone(),
            self.options.page_size,
            self.options.max_pages,
        );

        let mut photos = Vec::new();
        let (mut saved, mut metadata_failures, mut failures) = (0, 0, 0);

        Self::transition(&name, AlbumState::Listing);
        while let Some(page) = paginator.next_page().await? {
            Self::transition(&name, AlbumState::Downloading);
            // Download concurrency equals the listing page size
            let report = self
                .downloader
                .download_batch(&page, album_dir, self.options.page_size as usize)
                .await;
            saved += report.saved();
            metadata_failures += report.metadata_failures();
            failures += report.failures();

            // Accumulate from the listing, not from download completions
            photos.extend(page);
            Self::transition(&name, AlbumState::Listing);
        }

        Self::transition(&name, AlbumState::Manifesting);
        tokio_fs::create_dir_all(album_dir)
            .await
            .with_context(|| format!("Failed to create album directory {}", album_dir.display()))?;

        let manifest_path = album_dir.join(ArchiveManifest::FILE_NAME);
        info!("Storing album data in {}", manifest_path.display());

        let photo_count = photos.len();
        let manifest = ArchiveManifest::new(album, photos);
        tokio_fs::write(&manifest_path, manifest.to_pretty_json()?)
            .await
            .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

        Self::transition(&name, AlbumState::Done);
        Ok(AlbumOutcome::Done {
            photos: photo_count,
            saved,
            metadata_failures,
            failures,
        })
    }

    fn album_dir(&self, album: &Album) -> Result<PathBuf> {
        let name = album.directory_name();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            bail!("Album name {:?} cannot be used as a directory name", album.name);
        }
        Ok(self.options.out_dir.join(name))
    }

    fn transition(name: &str, state: AlbumState) {
        debug!("Album \"{name}\" -> {state}");
    }
}
