//! On-disk layout for downloaded photos: `<album>/<year>/<MM>/<basename>`.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use url::Url;

use crate::api::Photo;

/// Rewrites an `http://` URL to `https://`. Other URLs are returned unchanged.
pub fn secure_url(url: &str) -> String {
    match url.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("http://") => format!("https://{}", &url[7..]),
        _ => url.to_string(),
    }
}

/// Derives the destination file of `photo` inside `album_dir`.
///
/// Pure: nothing is created or checked on disk.
pub fn plan(album_dir: &Path, photo: &Photo) -> Result<PathBuf> {
    let year = photo.year().with_context(|| {
        format!("Photo {} has unusable dateTakenYear {}", photo.id, photo.date_taken_year)
    })?;
    let month = photo
        .month()
        .filter(|month| (1..=12).contains(month))
        .with_context(|| {
            format!("Photo {} has invalid dateTakenMonth {}", photo.id, photo.date_taken_month)
        })?;

    let url = photo
        .original_url()
        .with_context(|| format!("Photo {} has no pathOriginal", photo.id))?;
    let basename =
        url_basename(url).with_context(|| format!("Photo {} has no usable file name", photo.id))?;

    Ok(album_dir
        .join(year.to_string())
        .join(format!("{month:02}"))
        .join(basename))
}

/// Last path segment of a URL, ignoring the query string and any `<`/`>`
/// wrapping characters
fn url_basename(raw: &str) -> Result<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '<' && *c != '>').collect();
    let url = Url::parse(cleaned.trim()).with_context(|| format!("Invalid photo URL '{raw}'"))?;

    match url.path_segments().and_then(|mut segments| segments.next_back()) {
        Some(segment) if !segment.is_empty() => Ok(segment.to_string()),
        _ => bail!("URL '{raw}' has no file name"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RawField;

    fn photo(url: &str, year: i32, month: u32) -> Photo {
        Photo::new("p1", url, year, month)
    }

    #[test]
    fn test_single_digit_month_is_zero_padded() -> Result<()> {
        let path = plan(
            Path::new("Trip"),
            &photo("https://cdn.example.com/a/one.jpg", 2021, 3),
        )?;
        assert_eq!(path, PathBuf::from("Trip/2021/03/one.jpg"));
        Ok(())
    }

    #[test]
    fn test_two_digit_month_is_kept() -> Result<()> {
        let path = plan(
            Path::new("Trip"),
            &photo("https://cdn.example.com/a/two.jpg", 2021, 11),
        )?;
        assert_eq!(path, PathBuf::from("Trip/2021/11/two.jpg"));
        Ok(())
    }

    #[test]
    fn test_month_segment_is_always_two_characters() -> Result<()> {
        for month in 1..=12 {
            let path = plan(Path::new("A"), &photo("https://h/x.jpg", 2000, month))?;
            let segment = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            assert_eq!(segment.len(), 2, "month {month} gave {segment}");
        }
        Ok(())
    }

    #[test]
    fn test_query_and_angle_brackets_are_ignored() -> Result<()> {
        let path = plan(
            Path::new("Album"),
            &photo("<http://cdn.example.com/orig/abc_photo.jpg?sig=1&x=2>", 2019, 7),
        )?;
        assert_eq!(path, PathBuf::from("Album/2019/07/abc_photo.jpg"));
        Ok(())
    }

    #[test]
    fn test_out_of_range_month_is_rejected() {
        assert!(plan(Path::new("A"), &photo("https://h/x.jpg", 2000, 0)).is_err());
        assert!(plan(Path::new("A"), &photo("https://h/x.jpg", 2000, 13)).is_err());
    }

    #[test]
    fn test_unreadable_date_or_missing_url_is_rejected() {
        let mut blank_year = photo("https://h/x.jpg", 2000, 1);
        blank_year.date_taken_year = RawField::new("");
        assert!(plan(Path::new("A"), &blank_year).is_err());

        let mut named_month = photo("https://h/x.jpg", 2000, 1);
        named_month.date_taken_month = RawField::new("March");
        assert!(plan(Path::new("A"), &named_month).is_err());

        let mut no_url = photo("https://h/x.jpg", 2000, 1);
        no_url.path_original = RawField::default();
        assert!(plan(Path::new("A"), &no_url).is_err());
    }

    #[test]
    fn test_string_dates_are_read() -> Result<()> {
        let mut record = photo("https://h/x.jpg", 0, 0);
        record.date_taken_year = RawField::new("2018");
        record.date_taken_month = RawField::new("4");
        assert_eq!(plan(Path::new("A"), &record)?, PathBuf::from("A/2018/04/x.jpg"));
        Ok(())
    }

    #[test]
    fn test_url_without_file_name_is_rejected() {
        assert!(plan(Path::new("A"), &photo("https://cdn.example.com/", 2000, 1)).is_err());
        assert!(plan(Path::new("A"), &photo("not a url", 2000, 1)).is_err());
    }

    #[test]
    fn test_secure_url() {
        assert_eq!(secure_url("http://cdn.example.com/a.jpg"), "https://cdn.example.com/a.jpg");
        assert_eq!(secure_url("HTTP://cdn.example.com/a.jpg"), "https://cdn.example.com/a.jpg");
        assert_eq!(secure_url("https://cdn.example.com/a.jpg"), "https://cdn.example.com/a.jpg");
        assert_eq!(
            secure_url("https://cdn.example.com/http/a.jpg"),
            "https://cdn.example.com/http/a.jpg"
        );
    }
}
