//! Conditional request handling (`If-Modified-Since` / 304).

use axum::response::Response;
use httpdate::parse_http_date;
use tracing::debug;

use crate::engine::Engine;
use crate::error::SourceError;

use super::headers::HeaderDecorator;
use super::request::RequestView;

/// Result of checking a request against the source's modified time.
#[derive(Debug)]
pub enum Negotiation {
    /// Client copy is current; the pipeline returns this 304 as-is
    NotModified(Response),

    /// Continue with the source's modified time (epoch seconds)
    Modified(u64),
}

/// Look up the source's modified time and compare it to `If-Modified-Since`.
///
/// Only called when a cache TTL is configured.
pub async fn negotiate(
    engine: &dyn Engine,
    request: &RequestView,
    decorator: &HeaderDecorator,
) -> Result<Negotiation, SourceError> {
    let source_path = engine.source_path(&request.path)?;
    let modified_time = engine.last_modified(&source_path).await?;

    if is_not_modified(request.if_modified_since.as_deref(), modified_time) {
        debug!(path = %request.path, modified_time, "Not modified");
        return Ok(Negotiation::NotModified(
            decorator.not_modified(modified_time),
        ));
    }

    Ok(Negotiation::Modified(modified_time))
}

/// Whether `If-Modified-Since` names exactly the source's modified second.
///
/// A missing or unparseable header never matches.
pub fn is_not_modified(if_modified_since: Option<&str>, modified_time: u64) -> bool {
    let Some(value) = if_modified_since else {
        return false;
    };

    parse_http_date(value)
        .ok()
        .and_then(|since| since.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|since| since.as_secs() == modified_time)
        .unwrap_or(false)
}
