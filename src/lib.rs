//! # imgpipe
//!
//! An HTTP middleware that serves resized and transformed images from a
//! source directory, with signed URLs and conditional caching.
//!
//! Requests under a configured path prefix are checked against their
//! signature, answered with `304 Not Modified` when the client copy is
//! current, and otherwise served either as the untouched original or as a
//! derivative rendered (and cached on disk) by the image engine.
//!
//! ## Features
//!
//! - **Scoped**: only paths under a prefix are handled; everything else
//!   reaches the next handler untouched
//! - **Signed URLs**: HMAC-SHA256 over the path and manipulation parameters
//! - **Conditional caching**: `If-Modified-Since`, `Last-Modified`, `Expires`
//! - **Pass-through**: originals are streamed without re-encoding
//! - **Failure observers**: one hook for fallback images or custom error pages
//!
//! ## Architecture
//!
//! - [`pipeline`] - Request control flow, cache headers, failure dispatch
//! - [`engine`] - Engine traits and the filesystem engine
//! - [`server`] - Axum middleware, routes and signed URL handling
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use imgpipe::{create_router, EngineConfig, ImagePipeline, PipelineConfig, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = EngineConfig::new("/srv/images", "/var/cache/imgpipe").with_base_url("/img/");
//!     let pipeline = ImagePipeline::new(
//!         PipelineConfig::new(engine)
//!             .with_scope_prefix("/img/")
//!             .with_signed_urls(true)
//!             .with_sign_key("my-secret-key"),
//!     )?;
//!
//!     let router = create_router(pipeline, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod server;

// Re-export commonly used types
pub use config::{Cli, Command, ServeConfig, SignConfig};
pub use engine::{Engine, EngineConfig, EngineFactory, EngineOutput, FsEngine};
pub use error::{
    ConfigError, EngineError, FailureCause, PipelineError, SignatureError, SourceError,
};
pub use pipeline::{
    FailureAction, FailureEvent, ImagePipeline, PipelineConfig, PipelineOutcome, RequestView,
    SecurityConfig,
};
pub use server::{create_router, image_middleware, RouterConfig, SignedUrlAuth};
