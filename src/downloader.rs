//! Bounded-concurrency photo downloads.
//!
//! `ConcurrentDownloader::download_batch` fetches one listing page worth of
//! photos with at most `concurrency` requests in flight (the caller passes
//! the listing page size), and returns only
//! once every photo in the batch has either been saved or failed. A failing
//! photo never cancels its siblings; each one yields a `PhotoOutcome`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as tokio_fs;

use crate::api::Photo;
use crate::metadata::MetadataSynchronizer;
use crate::planner::{plan, secure_url};

/// Retrieves the binary content behind a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// `Fetcher` over plain HTTP(S) GET requests
#[derive(Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to GET photo from {url}"))?
            .error_for_status()
            .with_context(|| format!("Photo request to {url} was rejected"))?;

        let bytes = response
            .bytes()
            .await
            .context("Failed to read photo bytes")?;

        Ok(bytes.to_vec())
    }
}

/// Result of downloading a single photo
#[derive(Debug)]
pub enum PhotoOutcome {
    /// File written and metadata updated
    Saved { id: String, path: PathBuf },
    /// File written, but its embedded metadata could not be updated
    MetadataFailed {
        id: String,
        path: PathBuf,
        error: String,
    },
    /// Nothing was written for this photo
    Failed { id: String, error: String },
}

/// Outcomes of one batch, in completion order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<PhotoOutcome>,
}

impl BatchReport {
    pub fn saved(&self) -> usize {
        self.count(|o| matches!(o, PhotoOutcome::Saved { .. }))
    }

    pub fn metadata_failures(&self) -> usize {
        self.count(|o| matches!(o, PhotoOutcome::MetadataFailed { .. }))
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, PhotoOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&PhotoOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

pub struct ConcurrentDownloader {
    fetcher: Arc<dyn Fetcher>,
    synchronizer: MetadataSynchronizer,
}

impl ConcurrentDownloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, synchronizer: MetadataSynchronizer) -> Self {
        Self {
            fetcher,
            synchronizer,
        }
    }

    /// Downloads every photo of `photos` into `album_dir` with at most
    /// `concurrency` fetches in flight, waiting for the whole batch before
    /// returning
    pub async fn download_batch(
        &self,
        photos: &[Photo],
        album_dir: &Path,
        concurrency: usize,
    ) -> BatchReport {
        let concurrency = concurrency.max(1);
        debug!(
            "Downloading {} photos into {} ({concurrency} at a time)",
            photos.len(),
            album_dir.display()
        );

        let outcomes: Vec<PhotoOutcome> = stream::iter(photos)
            .map(|photo| self.download_photo(photo, album_dir))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let report = BatchReport { outcomes };
        info!(
            "Batch complete: {} saved, {} without metadata, {} failed",
            report.saved(),
            report.metadata_failures(),
            report.failures()
        );
        report
    }

    async fn download_photo(&self, photo: &Photo, album_dir: &Path) -> PhotoOutcome {
        let path = match self.fetch_and_save(photo, album_dir).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to download photo {}: {e:#}", photo.id);
                return PhotoOutcome::Failed {
                    id: photo.id.clone(),
                    error: format!("{e:#}"),
                };
            }
        };

        match self.synchronizer.sync(&path, photo).await {
            Ok(_) => PhotoOutcome::Saved {
                id: photo.id.clone(),
                path,
            },
            Err(e) => {
                warn!("Photo {} saved without metadata: {e:#}", photo.id);
                PhotoOutcome::MetadataFailed {
                    id: photo.id.clone(),
                    path,
                    error: format!("{e:#}"),
                }
            }
        }
    }

    async fn fetch_and_save(&self, photo: &Photo, album_dir: &Path) -> Result<PathBuf> {
        let path = plan(album_dir, photo)?;
        let url = photo
            .original_url()
            .map(secure_url)
            .with_context(|| format!("Photo {} has no pathOriginal", photo.id))?;

        let bytes = self.fetcher.fetch(&url).await?;

        // create_dir_all tolerates siblings creating the same month directory
        if let Some(parent) = path.parent() {
            tokio_fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        tokio_fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write photo to {}", path.display()))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFetcher, MockMetadataWriter, mock_photo};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn downloader(
        fetcher: Arc<MockFetcher>,
        writer: Arc<MockMetadataWriter>,
    ) -> ConcurrentDownloader {
        ConcurrentDownloader::new(fetcher, MetadataSynchronizer::new(writer))
    }

    #[tokio::test]
    async fn test_batch_writes_files_and_metadata() -> Result<()> {
        let temp_dir = tempdir()?;
        let album_dir = temp_dir.path().join("Trip");
        let fetcher = Arc::new(MockFetcher::new());
        let writer = Arc::new(MockMetadataWriter::new());
        let downloader = downloader(fetcher.clone(), writer.clone());

        let photos = vec![mock_photo("p1", 2021, 3), mock_photo("p2", 2021, 11)];
        let report = downloader.download_batch(&photos, &album_dir, 4).await;

        assert_eq!(report.saved(), 2);
        assert_eq!(report.failures(), 0);

        let first = album_dir.join("2021").join("03").join("p1.jpg");
        let second = album_dir.join("2021").join("11").join("p2.jpg");
        assert_eq!(fs::read(&first)?, b"image:https://cdn.example.com/original/p1.jpg");
        assert!(second.exists());
        assert_eq!(writer.writes().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_insecure_urls_are_fetched_over_https() -> Result<()> {
        let temp_dir = tempdir()?;
        let fetcher = Arc::new(MockFetcher::new());
        let downloader = downloader(fetcher.clone(), Arc::new(MockMetadataWriter::new()));

        let photos = vec![mock_photo("p1", 2020, 1), mock_photo("p2", 2020, 2)];
        downloader.download_batch(&photos, temp_dir.path(), 2).await;

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|url| url.starts_with("https://")));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_stop_siblings() -> Result<()> {
        let temp_dir = tempdir()?;
        let fetcher = Arc::new(MockFetcher::new().with_failure("p2.jpg"));
        let writer = Arc::new(MockMetadataWriter::new());
        let downloader = downloader(fetcher, writer.clone());

        let photos = vec![
            mock_photo("p1", 2020, 5),
            mock_photo("p2", 2020, 5),
            mock_photo("p3", 2020, 5),
        ];
        let report = downloader.download_batch(&photos, temp_dir.path(), 3).await;

        assert_eq!(report.saved(), 2);
        assert_eq!(report.failures(), 1);
        assert!(!temp_dir.path().join("2020/05/p2.jpg").exists());
        assert!(temp_dir.path().join("2020/05/p3.jpg").exists());
        assert_eq!(writer.writes().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_metadata_failure_keeps_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let downloader = downloader(
            Arc::new(MockFetcher::new()),
            Arc::new(MockMetadataWriter::failing()),
        );

        let report = downloader
            .download_batch(&[mock_photo("p1", 2019, 12)], temp_dir.path(), 2)
            .await;

        assert_eq!(report.metadata_failures(), 1);
        assert!(temp_dir.path().join("2019/12/p1.jpg").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_month_fails_without_fetching() -> Result<()> {
        let temp_dir = tempdir()?;
        let fetcher = Arc::new(MockFetcher::new());
        let downloader = downloader(fetcher.clone(), Arc::new(MockMetadataWriter::new()));

        let report = downloader
            .download_batch(&[mock_photo("p1", 2019, 13)], temp_dir.path(), 2)
            .await;

        assert_eq!(report.failures(), 1);
        assert!(fetcher.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() -> Result<()> {
        let temp_dir = tempdir()?;
        let fetcher = Arc::new(MockFetcher::new().with_delay(Duration::from_millis(20)));
        let downloader = downloader(fetcher.clone(), Arc::new(MockMetadataWriter::new()));

        let photos: Vec<Photo> = (1..=10)
            .map(|i| mock_photo(&format!("p{i}"), 2022, 8))
            .collect();
        let report = downloader.download_batch(&photos, temp_dir.path(), 3).await;

        assert_eq!(report.saved(), 10);
        assert!(fetcher.max_in_flight() <= 3);
        assert!(fetcher.max_in_flight() >= 2);
        Ok(())
    }
}
