//! Chooses between streaming the original file and rendering a derivative.

use std::collections::{BTreeMap, BTreeSet};

use axum::body::Body;
use axum::response::Response;
use http::header::{self, HeaderValue};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::engine::{Engine, EngineOutput};
use crate::error::{EngineError, FailureCause};
use crate::server::auth::SIGNATURE_PARAM;

use super::request::RequestView;

/// Turns a request into an image response.
#[derive(Debug, Clone, Default)]
pub struct ImageResponseResolver {
    allowed_params: Option<BTreeSet<String>>,
    pass_through: bool,
}

impl ImageResponseResolver {
    pub fn new(allowed_params: Option<BTreeSet<String>>, pass_through: bool) -> Self {
        Self {
            allowed_params,
            pass_through,
        }
    }

    /// Query parameters the engine gets to see. Parameters outside the
    /// allow-list are dropped silently.
    pub fn effective_params(&self, query: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        match &self.allowed_params {
            Some(allowed) => query
                .iter()
                .filter(|(key, _)| allowed.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            None => query.clone(),
        }
    }

    /// Whether the original file should be streamed untouched.
    pub fn is_pass_through(&self, params: &BTreeMap<String, String>) -> bool {
        self.pass_through && params.keys().all(|key| key == SIGNATURE_PARAM)
    }

    /// Produce the response body. Errors are returned undispatched.
    pub async fn resolve(
        &self,
        engine: &dyn Engine,
        request: &RequestView,
    ) -> Result<Response, FailureCause> {
        let params = self.effective_params(&request.query);

        let output = if self.is_pass_through(&params) {
            debug!(path = %request.path, "Streaming original");
            pass_through(engine, &request.path).await?
        } else {
            debug!(path = %request.path, params = params.len(), "Rendering derivative");
            engine.render(&request.path, &params).await?
        };

        Ok(into_response(output)?)
    }
}

async fn pass_through(engine: &dyn Engine, request_path: &str) -> Result<EngineOutput, EngineError> {
    let source_path = engine.source_path(request_path)?;
    let body = engine.read_stream(&source_path).await?;
    let content_type = engine.mime_type(&source_path).await?;
    let content_length = engine.file_size(&source_path).await?;

    Ok(EngineOutput {
        body,
        content_type,
        content_length,
    })
}

fn into_response(output: EngineOutput) -> Result<Response, EngineError> {
    let content_type = HeaderValue::from_str(&output.content_type)
        .map_err(|_| EngineError::InvalidMetadata(output.content_type.clone()))?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(output.body)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(output.content_length));

    Ok(response)
}
