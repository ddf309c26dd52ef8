//! Remote records and the API capability the archiver consumes.
//!
//! The hosting service returns loosely typed JSON: numeric fields sometimes
//! arrive as strings, `tags` may be missing or hold non-string scalars, and
//! records carry many fields the archiver never interprets. `Album` and
//! `Photo` parse the fields the pipeline needs and keep everything else in
//! `extra`, so the manifest written to disk still holds the full record.

use anyhow::Result;
use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// An album as reported by the album listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    pub name: String,
    /// Photo count reported by the server. Informational only.
    #[serde(rename = "count", default, deserialize_with = "lenient_int")]
    pub declared_count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Album {
    pub fn new(id: impl Into<String>, name: impl Into<String>, declared_count: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            declared_count,
            extra: Map::new(),
        }
    }

    /// The album name as used for its directory
    pub fn directory_name(&self) -> &str {
        self.name.trim()
    }
}

/// A field kept exactly as the server sent it and interpreted only when used,
/// so one odd record cannot spoil the listing page it arrived in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawField(Value);

impl RawField {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn is_missing(&self) -> bool {
        self.0.is_null()
    }

    /// Integer reading of a number or a numeric string
    pub fn as_int<T: TryFrom<i64>>(&self) -> Option<T> {
        let number = match &self.0 {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }?;
        T::try_from(number).ok()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Strings as they are, other scalars in their JSON spelling, null as nothing
    pub fn as_text(&self) -> Option<String> {
        match &self.0 {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for RawField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single photo record from the photo listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, skip_serializing_if = "RawField::is_missing")]
    pub title: RawField,
    #[serde(default, skip_serializing_if = "RawField::is_missing")]
    pub description: RawField,
    #[serde(default, skip_serializing_if = "RawField::is_missing")]
    pub tags: RawField,
    #[serde(rename = "pathOriginal", default, skip_serializing_if = "RawField::is_missing")]
    pub path_original: RawField,
    #[serde(rename = "dateTakenYear", default, skip_serializing_if = "RawField::is_missing")]
    pub date_taken_year: RawField,
    #[serde(rename = "dateTakenMonth", default, skip_serializing_if = "RawField::is_missing")]
    pub date_taken_month: RawField,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Photo {
    /// A record holding only the fields the archiver interprets
    pub fn new(
        id: impl Into<String>,
        original_url: impl Into<String>,
        year: i32,
        month: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: RawField::default(),
            description: RawField::default(),
            tags: RawField::default(),
            path_original: RawField::new(original_url.into()),
            date_taken_year: RawField::new(year),
            date_taken_month: RawField::new(month),
            extra: Map::new(),
        }
    }

    pub fn original_url(&self) -> Option<&str> {
        self.path_original.as_str().filter(|url| !url.trim().is_empty())
    }

    pub fn year(&self) -> Option<i32> {
        self.date_taken_year.as_int()
    }

    pub fn month(&self) -> Option<u32> {
        self.date_taken_month.as_int()
    }

    /// Tags coerced to strings; absent tags yield an empty list and a lone
    /// scalar yields a single keyword
    pub fn keywords(&self) -> Vec<String> {
        match &self.tags.0 {
            Value::Array(tags) => tags
                .iter()
                .filter_map(|tag| RawField::new(tag.clone()).as_text())
                .collect(),
            _ => self.tags.as_text().into_iter().collect(),
        }
    }
}

/// Persisted state of one archived album: the album record plus every photo
/// listed for it, in listing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    #[serde(flatten)]
    pub album: Album,
    pub photos: Vec<Photo>,
}

impl ArchiveManifest {
    /// File name of the manifest inside an album directory
    pub const FILE_NAME: &'static str = "album.json";

    pub fn new(album: Album, photos: Vec<Photo>) -> Self {
        Self { album, photos }
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read access to the photo hosting account
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// All albums of the account, in listing order
    async fn list_albums(&self) -> Result<Vec<Album>>;

    /// One page of an album's photos. An empty page means the album is exhausted.
    async fn list_photos(&self, album_id: &str, page: u32, page_size: u32) -> Result<Vec<Photo>>;
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected a string id, got {other}"))),
    }
}

fn lenient_int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| de::Error::custom(format!("expected an integer, got {value}")))?;

    T::try_from(number).map_err(|_| de::Error::custom(format!("integer {number} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn photo_json() -> Value {
        json!({
            "id": "abc",
            "title": "Sunset",
            "description": "Over the bay",
            "tags": ["beach", 2021, true],
            "pathOriginal": "http://cdn.example.com/original/sunset.jpg",
            "dateTakenYear": "2021",
            "dateTakenMonth": 3,
            "width": 4000,
            "latitude": null
        })
    }

    #[test]
    fn test_photo_accepts_string_and_numeric_dates() -> Result<()> {
        let photo: Photo = serde_json::from_value(photo_json())?;

        assert_eq!(photo.id, "abc");
        assert_eq!(photo.year(), Some(2021));
        assert_eq!(photo.month(), Some(3));
        assert_eq!(
            photo.original_url(),
            Some("http://cdn.example.com/original/sunset.jpg")
        );
        Ok(())
    }

    #[test]
    fn test_keywords_coerce_scalars_to_strings() -> Result<()> {
        let photo: Photo = serde_json::from_value(photo_json())?;
        assert_eq!(photo.keywords(), vec!["beach", "2021", "true"]);
        Ok(())
    }

    #[test]
    fn test_missing_or_null_tags_give_no_keywords() -> Result<()> {
        let mut value = photo_json();
        value["tags"] = Value::Null;
        let photo: Photo = serde_json::from_value(value.clone())?;
        assert!(photo.keywords().is_empty());

        value.as_object_mut().unwrap().remove("tags");
        let photo: Photo = serde_json::from_value(value)?;
        assert!(photo.tags.is_missing());
        assert!(photo.keywords().is_empty());
        Ok(())
    }

    #[test]
    fn test_unreadable_fields_still_parse_and_round_trip() -> Result<()> {
        let mut value = photo_json();
        value["dateTakenYear"] = json!("");
        value["dateTakenMonth"] = json!("March");
        value["title"] = json!(1999);
        value.as_object_mut().unwrap().remove("pathOriginal");

        let photo: Photo = serde_json::from_value(value)?;
        assert_eq!(photo.year(), None);
        assert_eq!(photo.month(), None);
        assert_eq!(photo.original_url(), None);
        assert_eq!(photo.title.as_text().as_deref(), Some("1999"));

        let written = serde_json::to_value(&photo)?;
        assert_eq!(written["dateTakenYear"], "");
        assert_eq!(written["dateTakenMonth"], "March");
        assert!(written.get("pathOriginal").is_none());
        Ok(())
    }

    #[test]
    fn test_lone_tag_becomes_one_keyword() -> Result<()> {
        let mut value = photo_json();
        value["tags"] = json!("harbour");
        let photo: Photo = serde_json::from_value(value)?;
        assert_eq!(photo.keywords(), vec!["harbour"]);
        Ok(())
    }

    #[test]
    fn test_album_numeric_id_and_string_count() -> Result<()> {
        let album: Album = serde_json::from_value(json!({
            "id": 42,
            "name": "  Trip ",
            "count": "50",
            "visible": 1
        }))?;

        assert_eq!(album.id, "42");
        assert_eq!(album.declared_count, 50);
        assert_eq!(album.directory_name(), "Trip");
        assert_eq!(album.extra.get("visible"), Some(&json!(1)));
        Ok(())
    }

    #[test]
    fn test_manifest_keeps_unparsed_fields() -> Result<()> {
        let mut album = Album::new("a1", "Trip", 1);
        album.extra.insert("owner".to_string(), json!("me@example.com"));
        let photo: Photo = serde_json::from_value(photo_json())?;

        let manifest = ArchiveManifest::new(album, vec![photo]);
        let text = manifest.to_pretty_json()?;
        let value: Value = serde_json::from_str(&text)?;

        assert_eq!(value["name"], "Trip");
        assert_eq!(value["owner"], "me@example.com");
        assert_eq!(value["photos"][0]["width"], 4000);
        assert_eq!(value["photos"][0]["pathOriginal"], "http://cdn.example.com/original/sunset.jpg");

        let parsed: ArchiveManifest = serde_json::from_str(&text)?;
        assert_eq!(parsed.photos.len(), 1);
        assert_eq!(parsed.album.name, "Trip");
        Ok(())
    }
}
