//! Image engine abstraction.
//!
//! The pipeline treats the engine as an opaque collaborator: given a source
//! path and a set of manipulation parameters it returns a byte stream plus
//! content type and length, or fails with a typed error.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             ImagePipeline               │
//! └────────────────────┬────────────────────┘
//!                      │ create_engine() per request
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           EngineFactory Trait           │
//! │  (EngineConfig, or any closure)         │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Engine Trait               │
//! │  source store + derivative rendering    │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   FsEngine (source dir + cache dir)     │
//! └─────────────────────────────────────────┘
//! ```

mod fs;
mod params;

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::{EngineError, SourceError};

pub use fs::{EngineConfig, FsEngine};
pub use params::{
    cache_key, Fit, ManipulationParams, OutputFormat, DEFAULT_QUALITY, MAX_DIMENSION,
};

/// Readable byte stream returned by the engine.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Bytes plus the metadata needed to put them on the wire.
pub struct EngineOutput {
    /// Image body
    pub body: ByteStream,

    /// MIME type, e.g. `image/png`
    pub content_type: String,

    /// Body length in bytes
    pub content_length: u64,
}

impl std::fmt::Debug for EngineOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOutput")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Source store access and derivative rendering.
///
/// Implementations must be thread-safe; one instance may serve concurrent
/// requests.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Map a decoded request path onto a path in the source store.
    fn source_path(&self, request_path: &str) -> Result<String, SourceError>;

    /// Modification time of a source file, in epoch seconds.
    async fn last_modified(&self, source_path: &str) -> Result<u64, SourceError>;

    /// Open the untouched source file.
    async fn read_stream(&self, source_path: &str) -> Result<ByteStream, SourceError>;

    /// Detected MIME type of a source file.
    async fn mime_type(&self, source_path: &str) -> Result<String, SourceError>;

    /// Size of a source file in bytes.
    async fn file_size(&self, source_path: &str) -> Result<u64, SourceError>;

    /// Produce (or fetch from the derivative cache) the image for a request
    /// path and its manipulation parameters.
    async fn render(
        &self,
        request_path: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<EngineOutput, EngineError>;
}

/// Produces an engine handle. Evaluated lazily, once per request.
pub trait EngineFactory: Send + Sync {
    fn create_engine(&self) -> Result<Arc<dyn Engine>, EngineError>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Result<Arc<dyn Engine>, EngineError> + Send + Sync,
{
    fn create_engine(&self) -> Result<Arc<dyn Engine>, EngineError> {
        self()
    }
}
