//! Response header decoration.
//!
//! Two passes, always in this order:
//!
//! 1. cache headers (`Cache-Control`, `Date`, `Last-Modified`, `Expires`),
//!    only when a cache TTL is configured and the modified time is known;
//! 2. statically configured custom headers, overwriting same-named headers
//!    from pass 1.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::response::Response;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use httpdate::fmt_http_date;

use crate::error::ConfigError;

/// Applies cache and custom headers to pipeline responses.
#[derive(Debug, Clone, Default)]
pub struct HeaderDecorator {
    cache_ttl: Option<Duration>,
    custom: Vec<(HeaderName, HeaderValue)>,
}

impl HeaderDecorator {
    /// Build a decorator, validating custom header names and values.
    pub fn new(
        cache_ttl: Option<Duration>,
        custom: &[(String, String)],
    ) -> Result<Self, ConfigError> {
        let custom = custom
            .iter()
            .map(|(name, value)| {
                let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    ConfigError::InvalidHeader {
                        name: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let header_value =
                    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
                Ok((header_name, header_value))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { cache_ttl, custom })
    }

    /// Decorate a successful response using the current time.
    pub fn decorate(&self, response: &mut Response, modified_time: Option<u64>) {
        self.decorate_at(response.headers_mut(), modified_time, SystemTime::now());
    }

    /// Decorate headers as of `now`.
    pub fn decorate_at(&self, headers: &mut HeaderMap, modified_time: Option<u64>, now: SystemTime) {
        if let (Some(ttl), Some(modified)) = (self.cache_ttl, modified_time) {
            let last = last_http_date();
            let expire = now.checked_add(ttl).map_or(last, |expire| expire.min(last));

            headers.insert(
                header::CACHE_CONTROL,
                http_value(format!("public,max-age={}", ttl.as_secs())),
            );
            headers.insert(header::DATE, http_value(fmt_http_date(now)));
            headers.insert(header::LAST_MODIFIED, http_value(format_epoch(modified)));
            headers.insert(header::EXPIRES, http_value(fmt_http_date(expire)));
        }

        self.apply_custom(headers);
    }

    /// Build an empty 304 response carrying `Last-Modified` and the custom
    /// headers. `Expires` is never set on a 304.
    pub fn not_modified(&self, modified_time: u64) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NOT_MODIFIED;

        let headers = response.headers_mut();
        headers.insert(header::LAST_MODIFIED, http_value(format_epoch(modified_time)));
        self.apply_custom(headers);

        response
    }

    fn apply_custom(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.custom {
            headers.insert(name.clone(), value.clone());
        }
    }
}

/// 9999-12-31T23:59:59Z, the last instant an HTTP-date can express.
pub const LAST_HTTP_DATE_SECS: u64 = 253_402_300_799;

fn last_http_date() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(LAST_HTTP_DATE_SECS)
}

/// Reject a TTL whose `Expires` would fall after the last HTTP-date.
pub fn check_cache_ttl(ttl: Duration) -> Result<(), ConfigError> {
    check_cache_ttl_at(ttl, SystemTime::now())
}

fn check_cache_ttl_at(ttl: Duration, now: SystemTime) -> Result<(), ConfigError> {
    match now.checked_add(ttl) {
        Some(expire) if expire <= last_http_date() => Ok(()),
        _ => Err(ConfigError::CacheTtlTooLarge(ttl.as_secs())),
    }
}

/// HTTP-date for an epoch-seconds timestamp, clamped to the last HTTP-date.
pub fn format_epoch(seconds: u64) -> String {
    fmt_http_date(UNIX_EPOCH + Duration::from_secs(seconds.min(LAST_HTTP_DATE_SECS)))
}

// Formatted dates and decimal numbers are always valid header values.
fn http_value(value: String) -> HeaderValue {
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}
