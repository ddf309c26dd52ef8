//! # trovebox-archiver
//!
//! A command-line tool that mirrors the albums of a Trovebox (OpenPhoto)
//! account onto local disk.
//!
//! For every album it lists the album's photos page by page, downloads each
//! page's photos concurrently into `<album>/<year>/<MM>/`, rewrites the
//! embedded title, description and keywords to match the server, and stores
//! the full album record in `<album>/album.json`.
//!
//! ## Features
//!
//! - OAuth 1.0a signed requests against the Trovebox REST API
//! - Download concurrency bounded by the listing page size
//! - Resumable: albums whose directory already exists are skipped
//! - Per-photo failures are logged and counted without stopping the album
//! - `status` command to inspect an existing archive offline

// Export modules for integration testing
pub mod api;
pub mod archive;
pub mod config;
pub mod downloader;
pub mod metadata;
pub mod mock;
pub mod oauth;
pub mod paginator;
pub mod planner;
pub mod query;
pub mod status;
pub mod trovebox;
