//! OAuth 1.0a request signing (HMAC-SHA1), as required by the Trovebox API.

use anyhow::{Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// The four secrets identifying the application and the account owner
#[derive(Debug, Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

pub struct OAuthSigner {
    credentials: Credentials,
}

impl OAuthSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Builds the `Authorization` header value for a request, with a fresh
    /// nonce and the current timestamp
    pub fn authorization_header(&self, method: &str, url: &Url) -> Result<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = Utc::now().timestamp().to_string();

        self.authorization_header_with(method, url, &nonce, &timestamp)
    }

    fn authorization_header_with(
        &self,
        method: &str,
        url: &Url,
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth_params = self.oauth_params(nonce, timestamp);
        let signature = self.signature(method, url, &oauth_params)?;
        oauth_params.push(("oauth_signature", signature));

        let fields: Vec<String> = oauth_params
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", key, encode(value)))
            .collect();

        Ok(format!("OAuth {}", fields.join(", ")))
    }

    fn oauth_params(&self, nonce: &str, timestamp: &str) -> Vec<(&'static str, String)> {
        vec![
            ("oauth_consumer_key", self.credentials.consumer_key.clone()),
            ("oauth_nonce", nonce.to_string()),
            ("oauth_signature_method", "HMAC-SHA1".to_string()),
            ("oauth_timestamp", timestamp.to_string()),
            ("oauth_token", self.credentials.token.clone()),
            ("oauth_version", "1.0".to_string()),
        ]
    }

    fn signature(
        &self,
        method: &str,
        url: &Url,
        oauth_params: &[(&'static str, String)],
    ) -> Result<String> {
        let base = signature_base_string(method, url, oauth_params);
        let key = format!(
            "{}&{}",
            encode(&self.credentials.consumer_secret),
            encode(&self.credentials.token_secret)
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| anyhow!("Invalid OAuth signing key: {e}"))?;
        mac.update(base.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// RFC 5849 §3.4.1 signature base string
fn signature_base_string(method: &str, url: &Url, oauth_params: &[(&'static str, String)]) -> String {
    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (encode(&key), encode(&value)))
        .chain(
            oauth_params
                .iter()
                .map(|(key, value)| (encode(key), encode(value))),
        )
        .collect();
    params.sort();

    let normalized: Vec<String> = params
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(base_url.as_str()),
        encode(&normalized.join("&"))
    )
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
