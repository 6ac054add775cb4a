//! Filesystem-backed engine.
//!
//! Originals are read from a source directory; derivatives are written to a
//! cache directory laid out as
//!
//! ```text
//! <cache_root>/<source_path>/<sha256 of params>
//! ```
//!
//! so every derivative of one source lives in a directory named after it.
//! Concurrent renders of the same derivative may both write the file. Each
//! write goes through its own temp file, the last rename wins and the
//! contents are identical.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

use crate::error::{EngineError, SourceError};

use super::params::{cache_key, ManipulationParams, OutputFormat};
use super::{ByteStream, Engine, EngineFactory, EngineOutput};

/// Literal engine configuration.
///
/// Implements [`EngineFactory`] by building an [`FsEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the original images
    pub source_root: PathBuf,

    /// Directory derivatives are written to
    pub cache_root: PathBuf,

    /// URL prefix stripped from request paths before resolving sources
    pub base_url: String,
}

impl EngineConfig {
    pub fn new(source_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            cache_root: cache_root.into(),
            base_url: String::new(),
        }
    }

    /// Set the URL prefix stripped from request paths (e.g. `/images/`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl EngineFactory for EngineConfig {
    fn create_engine(&self) -> Result<Arc<dyn Engine>, EngineError> {
        Ok(Arc::new(FsEngine::new(self.clone())))
    }
}

/// Engine over a local source directory and derivative cache directory.
#[derive(Debug, Clone)]
pub struct FsEngine {
    config: EngineConfig,
}

impl FsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Directory holding every derivative of a source path.
    pub fn derivative_dir(&self, source_path: &str) -> PathBuf {
        self.config.cache_root.join(source_path)
    }

    fn resolve(&self, source_path: &str) -> PathBuf {
        self.config.source_root.join(source_path)
    }

    async fn metadata(&self, source_path: &str) -> Result<std::fs::Metadata, SourceError> {
        let metadata = fs::metadata(self.resolve(source_path))
            .await
            .map_err(|e| SourceError::from_io(source_path, e))?;

        if !metadata.is_file() {
            return Err(SourceError::NotFound(source_path.to_string()));
        }
        Ok(metadata)
    }

    async fn open_output(
        &self,
        path: &Path,
        content_type: &str,
    ) -> Result<EngineOutput, EngineError> {
        let file = fs::File::open(path)
            .await
            .map_err(|e| EngineError::Cache(format!("{}: {}", path.display(), e)))?;
        let content_length = file
            .metadata()
            .await
            .map_err(|e| EngineError::Cache(format!("{}: {}", path.display(), e)))?
            .len();

        Ok(EngineOutput {
            body: Box::pin(file),
            content_type: content_type.to_string(),
            content_length,
        })
    }

    /// Store a rendered derivative and hand its bytes back.
    async fn write_derivative(&self, path: &Path, data: Vec<u8>) -> Result<Vec<u8>, EngineError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            persist_derivative(&path, &data)?;
            Ok::<_, EngineError>(data)
        })
        .await
        .map_err(|e| EngineError::Cache(e.to_string()))?
    }
}

/// Write through a uniquely named temp file, then rename into place.
fn persist_derivative(path: &Path, data: &[u8]) -> Result<(), EngineError> {
    let cache_err = |e: std::io::Error| EngineError::Cache(format!("{}: {}", path.display(), e));

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(cache_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(cache_err)?;
    tmp.write_all(data).map_err(cache_err)?;

    match tmp.persist(path) {
        Ok(_) => Ok(()),
        // A concurrent render of the same derivative landed first.
        Err(_) if path.is_file() => Ok(()),
        Err(e) => Err(cache_err(e.error)),
    }
}

#[async_trait]
impl Engine for FsEngine {
    fn source_path(&self, request_path: &str) -> Result<String, SourceError> {
        let base = self.config.base_url.trim_matches('/');
        let trimmed = request_path.trim_start_matches('/');

        let relative = if base.is_empty() {
            trimmed
        } else {
            trimmed
                .strip_prefix(base)
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
                .unwrap_or(trimmed)
        };
        let relative = relative.trim_matches('/');

        if relative.is_empty() {
            return Err(SourceError::InvalidPath(request_path.to_string()));
        }

        let escapes = Path::new(relative)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(SourceError::InvalidPath(request_path.to_string()));
        }

        Ok(relative.to_string())
    }

    async fn last_modified(&self, source_path: &str) -> Result<u64, SourceError> {
        let modified = self
            .metadata(source_path)
            .await?
            .modified()
            .map_err(|e| SourceError::Io(format!("{}: {}", source_path, e)))?;

        Ok(modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0))
    }

    async fn read_stream(&self, source_path: &str) -> Result<ByteStream, SourceError> {
        let file = fs::File::open(self.resolve(source_path))
            .await
            .map_err(|e| SourceError::from_io(source_path, e))?;
        Ok(Box::pin(file))
    }

    async fn mime_type(&self, source_path: &str) -> Result<String, SourceError> {
        self.metadata(source_path).await?;

        Ok(ImageFormat::from_path(source_path)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string()))
    }

    async fn file_size(&self, source_path: &str) -> Result<u64, SourceError> {
        Ok(self.metadata(source_path).await?.len())
    }

    async fn render(
        &self,
        request_path: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<EngineOutput, EngineError> {
        let source_path = self.source_path(request_path)?;
        let manipulation = ManipulationParams::from_query(params)?;

        let source_file = self.resolve(&source_path);
        let output_format = manipulation.output_format(ImageFormat::from_path(&source_file).ok());
        let cache_file = self.derivative_dir(&source_path).join(cache_key(params));

        if fs::metadata(&cache_file)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            debug!(source = %source_path, "Serving cached derivative");
            return self
                .open_output(&cache_file, output_format.mime_type())
                .await;
        }

        let source = fs::read(&source_file)
            .await
            .map_err(|e| SourceError::from_io(&source_path, e))?;

        let encoded = tokio::task::spawn_blocking(move || {
            transform(&source, &manipulation, output_format)
        })
        .await
        .map_err(|e| EngineError::Encode {
            message: e.to_string(),
        })??;

        let encoded = self.write_derivative(&cache_file, encoded).await?;
        debug!(
            source = %source_path,
            bytes = encoded.len(),
            "Rendered derivative"
        );

        Ok(EngineOutput {
            content_length: encoded.len() as u64,
            content_type: output_format.mime_type().to_string(),
            body: Box::pin(Cursor::new(encoded)),
        })
    }
}

/// Decode, resize and re-encode an image.
fn transform(
    source: &[u8],
    params: &ManipulationParams,
    format: OutputFormat,
) -> Result<Vec<u8>, EngineError> {
    let image = image::load_from_memory(source).map_err(|e| EngineError::Decode {
        message: e.to_string(),
    })?;
    let image = params.apply(image);

    let mut output = Vec::new();
    let encoded = match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            JpegEncoder::new_with_quality(&mut output, params.quality).encode_image(&rgb)
        }
        OutputFormat::Png => image.write_to(&mut Cursor::new(&mut output), ImageFormat::Png),
    };
    encoded.map_err(|e| EngineError::Encode {
        message: e.to_string(),
    })?;

    Ok(output)
}
