//! Read-only per-request view.

use std::collections::BTreeMap;

use http::{header, HeaderMap, Uri};
use url::form_urlencoded;

/// The parts of an HTTP request the pipeline consumes.
///
/// Built once at pipeline entry and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestView {
    /// Percent-decoded request path
    pub path: String,

    /// Query parameters; a repeated key keeps its last value
    pub query: BTreeMap<String, String>,

    /// Raw `If-Modified-Since` header value
    pub if_modified_since: Option<String>,
}

impl RequestView {
    pub fn new(path: impl Into<String>, query: BTreeMap<String, String>) -> Self {
        Self {
            path: path.into(),
            query,
            if_modified_since: None,
        }
    }

    /// Attach an `If-Modified-Since` value.
    pub fn with_if_modified_since(mut self, value: impl Into<String>) -> Self {
        self.if_modified_since = Some(value.into());
        self
    }

    /// Build a view from a request URI and headers.
    pub fn from_parts(uri: &Uri, headers: &HeaderMap) -> Self {
        let raw_path = uri.path();
        let path = urlencoding::decode(raw_path)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw_path.to_string());

        let query = uri
            .query()
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        let if_modified_since = headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Self {
            path,
            query,
            if_modified_since,
        }
    }
}
