//! Signed URL validation.
//!
//! This module provides HMAC-SHA256 based URL signing for image requests.
//!
//! # URL Signing Scheme
//!
//! URLs are signed by computing an HMAC-SHA256 over the decoded path and the
//! query parameters (excluding `s`), sorted by key and form-encoded:
//!
//! ```text
//! signature = HMAC-SHA256(sign_key, "{path}?{canonical_query}")
//! ```
//!
//! The hex-encoded signature travels in the `s` query parameter:
//!
//! ```text
//! /images/cake%20logo.png?w=100&s=9f2c...
//! ```
//!
//! # Security Properties
//!
//! - **Path + query binding**: changing the path or any parameter invalidates the signature
//! - **Constant-time comparison**: verification does not leak where signatures differ
//!
//! # Example
//!
//! ```rust
//! use imgpipe::server::auth::SignedUrlAuth;
//! use std::collections::BTreeMap;
//!
//! let auth = SignedUrlAuth::new("my-secret-key");
//!
//! let mut params = BTreeMap::new();
//! params.insert("w".to_string(), "100".to_string());
//!
//! let signature = auth.sign("/images/logo.png", &params);
//! params.insert("s".to_string(), signature);
//!
//! assert!(auth.verify("/images/logo.png", &params).is_ok());
//! ```

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::error::SignatureError;

use super::handlers::ErrorResponse;

/// Query parameter carrying the signature.
pub const SIGNATURE_PARAM: &str = "s";

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Error Mapping
// =============================================================================

impl SignatureError {
    /// Machine-readable error type used in JSON bodies.
    pub fn error_type(&self) -> &'static str {
        match self {
            SignatureError::Missing => "missing_signature",
            SignatureError::Mismatch => "invalid_signature",
        }
    }
}

impl IntoResponse for SignatureError {
    fn into_response(self) -> Response {
        let status = StatusCode::FORBIDDEN;
        let error_type = self.error_type();
        let message = self.to_string();

        // A mismatch may be tampering; a missing signature is usually a bad link
        match &self {
            SignatureError::Mismatch => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Signature check failed: {}",
                    message
                );
            }
            SignatureError::Missing => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Signature check failed: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Signed URL Authentication
// =============================================================================

/// Signs and verifies image URLs with HMAC-SHA256.
#[derive(Clone)]
pub struct SignedUrlAuth {
    /// Secret key for HMAC computation
    secret_key: Vec<u8>,
}

impl std::fmt::Debug for SignedUrlAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedUrlAuth").finish_non_exhaustive()
    }
}

impl SignedUrlAuth {
    /// Create a new authenticator with the given secret key.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Compute the hex-encoded signature for a path and its parameters.
    ///
    /// An `s` entry in `params` is ignored.
    pub fn sign(&self, path: &str, params: &BTreeMap<String, String>) -> String {
        let message = signature_base(path, params);

        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(message.as_bytes());

        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify the `s` parameter of a request against its path and parameters.
    pub fn verify(
        &self,
        path: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), SignatureError> {
        let provided = params
            .get(SIGNATURE_PARAM)
            .ok_or(SignatureError::Missing)?;

        let provided_sig = hex::decode(provided).map_err(|_| SignatureError::Mismatch)?;
        let expected_sig =
            hex::decode(self.sign(path, params)).map_err(|_| SignatureError::Mismatch)?;

        if provided_sig.ct_eq(&expected_sig).into() {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Generate a signed URL for a path.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Prefix prepended verbatim (e.g. "https://cdn.example.com")
    /// * `path` - Decoded image path (e.g. "/images/cake logo.png")
    /// * `params` - Manipulation parameters
    pub fn generate_signed_url(
        &self,
        base_url: &str,
        path: &str,
        params: &BTreeMap<String, String>,
    ) -> String {
        let signature = self.sign(path, params);

        let encoded_path = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let mut query = canonical_query(params);
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(SIGNATURE_PARAM);
        query.push('=');
        query.push_str(&signature);

        format!("{}{}?{}", base_url.trim_end_matches('/'), encoded_path, query)
    }
}

/// Sorted, form-encoded query without the signature parameter.
///
/// Keys and values are escaped, so `&` or `=` inside a value cannot pose as
/// a separate parameter.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if key != SIGNATURE_PARAM {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

// The encoded query never holds a raw `?`, so the last one splits path from
// query even when the decoded path contains one.
fn signature_base(path: &str, params: &BTreeMap<String, String>) -> String {
    format!("{}?{}", path, canonical_query(params))
}

// =============================================================================
// Tests
// =============================================================================
