//! Query string construction for API requests.

use std::collections::BTreeMap;

/// Encodes `params` as an `application/x-www-form-urlencoded` query string.
///
/// Keys are emitted in sorted order so the same parameters always produce the
/// same string.
pub fn to_query_string(params: &BTreeMap<String, String>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Convenience constructor for a parameter map from string pairs
pub fn params<'a, I>(pairs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
