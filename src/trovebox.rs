//! HTTP client for the Trovebox (OpenPhoto) REST API.
//!
//! Every endpoint answers with an envelope of the form
//! `{"code": 200, "message": "...", "result": ...}`. The HTTP status and the
//! envelope code must both indicate success before `result` is trusted.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use url::Url;

use crate::api::{Album, ApiClient, Photo};
use crate::config::Config;
use crate::oauth::{Credentials, OAuthSigner};
use crate::query::{params, to_query_string};

const ALBUM_LIST_PATH: &str = "albums/list.json";
const PHOTO_LIST_PATH: &str = "photos/list.json";
/// Albums are listed in a single oversized page
const ALBUM_LIST_PAGE_SIZE: u32 = 9999;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    result: T,
}

pub struct TroveboxClient {
    client: Client,
    base_url: Url,
    signer: OAuthSigner,
}

impl TroveboxClient {
    pub fn new(host: &str, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: base_url(host)?,
            signer: OAuthSigner::new(credentials),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.host, config.credentials())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &BTreeMap<String, String>,
    ) -> Result<T> {
        let mut url = self
            .base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {path}"))?;
        url.set_query(Some(&to_query_string(query)));

        let authorization = self.signer.authorization_header("GET", &url)?;
        debug!("GET {url}");

        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .with_context(|| format!("Failed to GET {url}"))?
            .error_for_status()
            .with_context(|| format!("Request to {url} was rejected"))?;

        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {url}"))?;

        if let Some(code) = envelope.code {
            if !(200..300).contains(&code) {
                bail!(
                    "API error {code} from {url}: {}",
                    envelope.message.unwrap_or_default()
                );
            }
        }

        Ok(envelope.result)
    }
}

#[async_trait]
impl ApiClient for TroveboxClient {
    async fn list_albums(&self) -> Result<Vec<Album>> {
        let query = params([
            ("auth", "true".to_string()),
            ("pageSize", ALBUM_LIST_PAGE_SIZE.to_string()),
        ]);

        self.get(ALBUM_LIST_PATH, &query)
            .await
            .context("Failed to list albums")
    }

    async fn list_photos(&self, album_id: &str, page: u32, page_size: u32) -> Result<Vec<Photo>> {
        let query = params([
            ("auth", "true".to_string()),
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
            ("album", album_id.to_string()),
        ]);

        self.get(PHOTO_LIST_PATH, &query)
            .await
            .with_context(|| format!("Failed to list page {page} of album {album_id}"))
    }
}

/// Parses the configured host, assuming https when no scheme is given.
/// The path always ends in `/` so endpoint paths join beneath it.
fn base_url(host: &str) -> Result<Url> {
    let host = host.trim();
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };

    let mut url =
        Url::parse(&with_scheme).with_context(|| format!("Invalid API host '{host}'"))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
