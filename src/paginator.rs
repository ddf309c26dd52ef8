//! Page-by-page enumeration of an album's photos.
//!
//! Enumeration ends at the first empty page. The album's declared photo count
//! plays no part: servers are known to report counts that do not match what
//! the listing actually returns.

use anyhow::{Result, bail};
use log::debug;

use crate::api::{ApiClient, Photo};

pub struct AlbumPaginator<'a> {
    client: &'a dyn ApiClient,
    album_id: String,
    page_size: u32,
    max_pages: u32,
    next_page: u32,
    exhausted: bool,
}

impl<'a> AlbumPaginator<'a> {
    /// `max_pages` bounds the number of listing requests, so a server that
    /// never returns an empty page cannot stall the run forever
    pub fn new(
        client: &'a dyn ApiClient,
        album_id: impl Into<String>,
        page_size: u32,
        max_pages: u32,
    ) -> Self {
        Self {
            client,
            album_id: album_id.into(),
            page_size,
            max_pages,
            next_page: 1,
            exhausted: false,
        }
    }

    /// Number of listing requests issued so far
    pub fn pages_requested(&self) -> u32 {
        self.next_page - 1
    }

    /// Fetches the next non-empty page, or `None` once the album is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<Photo>>> {
        if self.exhausted {
            return Ok(None);
        }

        if self.pages_requested() >= self.max_pages {
            bail!(
                "Album {} still returned photos after {} pages",
                self.album_id,
                self.max_pages
            );
        }

        let page = self.next_page;
        let photos = self
            .client
            .list_photos(&self.album_id, page, self.page_size)
            .await?;
        self.next_page += 1;

        if photos.is_empty() {
            debug!("Album {}: page {page} is empty, listing complete", self.album_id);
            self.exhausted = true;
            return Ok(None);
        }

        debug!("Album {}: page {page} returned {} photos", self.album_id, photos.len());
        Ok(Some(photos))
    }

    /// Drains the paginator into a single list, in listing order
    pub async fn collect_all(mut self) -> Result<Vec<Photo>> {
        let mut photos = Vec::new();
        while let Some(page) = self.next_page().await? {
            photos.extend(page);
        }
        Ok(photos)
    }
}
