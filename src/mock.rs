//! In-memory stand-ins for the remote API, the photo fetcher and the metadata
//! writer. They record every call so tests can assert on traffic.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::api::{Album, ApiClient, Photo, RawField};
use crate::downloader::Fetcher;
use crate::metadata::{MetadataWriter, PhotoMetadata};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A photo served from `http://cdn.example.com/original/<id>.jpg`
pub fn mock_photo(id: &str, year: i32, month: u32) -> Photo {
    let mut photo = Photo::new(
        id,
        format!("http://cdn.example.com/original/{id}.jpg"),
        year,
        month,
    );
    photo.title = RawField::new(format!("Title {id}"));
    photo.description = RawField::new(format!("Description {id}"));
    photo.tags = RawField::new(vec![Value::from("mock"), Value::from(year)]);
    photo
}

/// `count` photos with ids `<prefix>-1 ..= <prefix>-count`, spread over the months of 2020
pub fn mock_photos(prefix: &str, count: usize) -> Vec<Photo> {
    (1..=count)
        .map(|i| mock_photo(&format!("{prefix}-{i}"), 2020, ((i - 1) % 12) as u32 + 1))
        .collect()
}

enum AlbumPages {
    Pages(Vec<Vec<Photo>>),
    FailsAt(Vec<Vec<Photo>>, u32),
    Endless,
    Failing,
}

/// State of an observed `MockFetcher` at the moment a photo page was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub page: u32,
    pub in_flight: usize,
    pub completed: usize,
}

/// Scripted `ApiClient`
#[derive(Default)]
pub struct MockApi {
    albums: Vec<Album>,
    pages: HashMap<String, AlbumPages>,
    fail_album_listing: bool,
    album_list_calls: AtomicUsize,
    photo_requests: Mutex<Vec<(String, u32, u32)>>,
    observed_fetcher: Option<Arc<MockFetcher>>,
    fetch_progress: Mutex<Vec<FetchProgress>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an album whose listing returns `pages` in order, then empty pages
    pub fn with_album(mut self, album: Album, pages: Vec<Vec<Photo>>) -> Self {
        self.pages.insert(album.id.clone(), AlbumPages::Pages(pages));
        self.albums.push(album);
        self
    }

    /// Adds an album that serves `pages` but errors when `failing_page` is requested
    pub fn with_album_failing_at(
        mut self,
        album: Album,
        pages: Vec<Vec<Photo>>,
        failing_page: u32,
    ) -> Self {
        self.pages
            .insert(album.id.clone(), AlbumPages::FailsAt(pages, failing_page));
        self.albums.push(album);
        self
    }

    /// Adds an album that never returns an empty page
    pub fn with_endless_album(mut self, album: Album) -> Self {
        self.pages.insert(album.id.clone(), AlbumPages::Endless);
        self.albums.push(album);
        self
    }

    /// Adds an album whose photo listing always errors
    pub fn with_failing_album(mut self, album: Album) -> Self {
        self.pages.insert(album.id.clone(), AlbumPages::Failing);
        self.albums.push(album);
        self
    }

    pub fn with_failing_album_listing(mut self) -> Self {
        self.fail_album_listing = true;
        self
    }

    /// Records how far `fetcher` has got each time a photo page is requested
    pub fn observing(mut self, fetcher: Arc<MockFetcher>) -> Self {
        self.observed_fetcher = Some(fetcher);
        self
    }

    pub fn fetch_progress(&self) -> Vec<FetchProgress> {
        locked(&self.fetch_progress).clone()
    }

    pub fn album_list_calls(&self) -> usize {
        self.album_list_calls.load(Ordering::SeqCst)
    }

    /// Page numbers requested for `album_id`, in request order
    pub fn photo_requests(&self, album_id: &str) -> Vec<u32> {
        locked(&self.photo_requests)
            .iter()
            .filter(|(id, _, _)| id == album_id)
            .map(|(_, page, _)| *page)
            .collect()
    }

    /// Page sizes requested for `album_id`, in request order
    pub fn page_sizes(&self, album_id: &str) -> Vec<u32> {
        locked(&self.photo_requests)
            .iter()
            .filter(|(id, _, _)| id == album_id)
            .map(|(_, _, size)| *size)
            .collect()
    }
}

#[async_trait]
impl ApiClient for MockApi {
    async fn list_albums(&self) -> Result<Vec<Album>> {
        self.album_list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_album_listing {
            bail!("mock album listing failure");
        }
        Ok(self.albums.clone())
    }

    async fn list_photos(&self, album_id: &str, page: u32, page_size: u32) -> Result<Vec<Photo>> {
        locked(&self.photo_requests).push((album_id.to_string(), page, page_size));
        if let Some(fetcher) = &self.observed_fetcher {
            locked(&self.fetch_progress).push(FetchProgress {
                page,
                in_flight: fetcher.in_flight(),
                completed: fetcher.completed(),
            });
        }

        match self.pages.get(album_id) {
            Some(AlbumPages::Pages(pages)) => Ok(page_of(pages, page)),
            Some(AlbumPages::FailsAt(_, failing_page)) if page == *failing_page => {
                bail!("mock listing failure for page {page} of album {album_id}")
            }
            Some(AlbumPages::FailsAt(pages, _)) => Ok(page_of(pages, page)),
            Some(AlbumPages::Endless) => Ok(mock_photos(&format!("{album_id}-page{page}"), 1)),
            Some(AlbumPages::Failing) => bail!("mock listing failure for album {album_id}"),
            None => bail!("unknown album {album_id}"),
        }
    }
}

fn page_of(pages: &[Vec<Photo>], page: u32) -> Vec<Photo> {
    page.checked_sub(1)
        .and_then(|index| pages.get(index as usize))
        .cloned()
        .unwrap_or_default()
}

/// `Fetcher` returning `image:<url>` for every URL
#[derive(Default)]
pub struct MockFetcher {
    failures: Vec<String>,
    delays: Vec<(String, Duration)>,
    default_delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every URL containing `fragment`
    pub fn with_failure(mut self, fragment: &str) -> Self {
        self.failures.push(fragment.to_string());
        self
    }

    /// Delays every fetch by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Delays fetches of URLs containing `fragment`
    pub fn with_delay_for(mut self, fragment: &str, delay: Duration) -> Self {
        self.delays.push((fragment.to_string(), delay));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        locked(&self.requests).clone()
    }

    /// Highest number of fetches observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Fetches that have finished, successfully or not
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        locked(&self.requests).push(url.to_string());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = self
            .delays
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, delay)| *delay)
            .or(self.default_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.failures.iter().any(|fragment| url.contains(fragment.as_str())) {
            bail!("mock fetch failure for {url}");
        }

        Ok(format!("image:{url}").into_bytes())
    }
}

/// `MetadataWriter` that records what it was asked to write
#[derive(Default)]
pub struct MockMetadataWriter {
    fail: bool,
    writes: Mutex<Vec<(PathBuf, PhotoMetadata)>>,
}

impl MockMetadataWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer that rejects every write
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<(PathBuf, PhotoMetadata)> {
        locked(&self.writes).clone()
    }
}

#[async_trait]
impl MetadataWriter for MockMetadataWriter {
    async fn write(&self, path: &Path, metadata: &PhotoMetadata) -> Result<()> {
        if self.fail {
            bail!("mock metadata failure for {}", path.display());
        }
        locked(&self.writes).push((path.to_path_buf(), metadata.clone()));
        Ok(())
    }
}
