//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health     - Health check (public, never reaches the pipeline)
//! /*          - Image pipeline; forwarded requests fall through to a 404
//! ```
//!
//! # Example
//!
//! ```ignore
//! use imgpipe::{create_router, EngineConfig, ImagePipeline, PipelineConfig, RouterConfig};
//!
//! let engine = EngineConfig::new("/srv/images", "/var/cache/imgpipe").with_base_url("/img/");
//! let pipeline = ImagePipeline::new(PipelineConfig::new(engine).with_scope_prefix("/img/"))?;
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(pipeline, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{middleware, routing::get, Router};
use http::header::{CONTENT_TYPE, IF_MODIFIED_SINCE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{fallback_handler, health_handler};
use super::middleware::image_middleware;
use crate::pipeline::ImagePipeline;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Any CORS origin, tracing enabled.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// The pipeline wraps the fallback route only, so `/health` stays reachable
/// whatever the scope prefix.
pub fn create_router(pipeline: ImagePipeline, config: RouterConfig) -> Router {
    let cors = build_cors_layer(&config);

    let image_routes = Router::new()
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(pipeline, image_middleware));

    let public_routes = Router::new().route("/health", get(health_handler));

    let router = Router::new()
        .merge(public_routes)
        .merge(image_routes)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, IF_MODIFIED_SINCE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
