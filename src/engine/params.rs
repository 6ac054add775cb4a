//! Manipulation parameters understood by the filesystem engine.
//!
//! | Key  | Meaning                                  | Default          |
//! |------|------------------------------------------|------------------|
//! | `w`  | target width in pixels                   | source width     |
//! | `h`  | target height in pixels                  | source height    |
//! | `fit`| `contain`, `stretch` or `crop`           | `contain`        |
//! | `fm` | output format, `jpg` or `png`            | source format    |
//! | `q`  | JPEG quality 1-100                       | 90               |
//!
//! Unknown keys are ignored when rendering but still take part in the
//! derivative cache key.

use std::collections::BTreeMap;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};

use crate::error::EngineError;
use crate::server::auth::canonical_query;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 90;

/// Largest width or height a derivative may request.
pub const MAX_DIMENSION: u32 = 8192;

/// How the image is fitted into the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fit {
    /// Scale to fit inside the box, keeping the aspect ratio
    #[default]
    Contain,
    /// Scale to exactly the box, ignoring the aspect ratio
    Stretch,
    /// Scale to cover the box, then crop the overflow
    Crop,
}

/// Encodings a derivative can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "pjpg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }

    /// Output format matching a source image format, if it can be written.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::Png => Some(OutputFormat::Png),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

/// Parsed manipulation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManipulationParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Fit,
    pub format: Option<OutputFormat>,
    pub quality: u8,
}

impl Default for ManipulationParams {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            fit: Fit::Contain,
            format: None,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl ManipulationParams {
    /// Parse parameters from a query map.
    pub fn from_query(query: &BTreeMap<String, String>) -> Result<Self, EngineError> {
        let mut params = ManipulationParams::default();

        if let Some(value) = query.get("w") {
            params.width = Some(parse_dimension("w", value)?);
        }
        if let Some(value) = query.get("h") {
            params.height = Some(parse_dimension("h", value)?);
        }
        if let Some(value) = query.get("fit") {
            params.fit = match value.as_str() {
                "contain" | "max" => Fit::Contain,
                "stretch" => Fit::Stretch,
                "crop" => Fit::Crop,
                _ => return Err(invalid("fit", value)),
            };
        }
        if let Some(value) = query.get("fm") {
            params.format = Some(OutputFormat::parse(value).ok_or_else(|| invalid("fm", value))?);
        }
        if let Some(value) = query.get("q") {
            params.quality = match value.parse::<u8>() {
                Ok(q) if (1..=100).contains(&q) => q,
                _ => return Err(invalid("q", value)),
            };
        }

        Ok(params)
    }

    /// Format the derivative is written in, given the source's format.
    pub fn output_format(&self, source: Option<ImageFormat>) -> OutputFormat {
        self.format
            .or_else(|| source.and_then(OutputFormat::from_image_format))
            .unwrap_or(OutputFormat::Jpeg)
    }

    /// Target box for a source of the given size, or `None` to keep the size.
    pub fn target_dimensions(&self, source_width: u32, source_height: u32) -> Option<(u32, u32)> {
        let scale = |value: u32, from: u32, to: u32| -> u32 {
            let scaled = (u64::from(value) * u64::from(to) + u64::from(from) / 2) / u64::from(from);
            scaled.clamp(1, u64::from(MAX_DIMENSION)) as u32
        };

        match (self.width, self.height) {
            (None, None) => None,
            (Some(w), Some(h)) => Some((w, h)),
            (Some(w), None) => Some((w, scale(source_height, source_width.max(1), w))),
            (None, Some(h)) => Some((scale(source_width, source_height.max(1), h), h)),
        }
    }

    /// Apply resizing to a decoded image.
    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        let Some((width, height)) = self.target_dimensions(image.width(), image.height()) else {
            return image;
        };

        match self.fit {
            Fit::Contain => image.resize(width, height, FilterType::Triangle),
            Fit::Stretch => image.resize_exact(width, height, FilterType::Triangle),
            Fit::Crop => image.resize_to_fill(width, height, FilterType::Triangle),
        }
    }
}

fn parse_dimension(name: &str, value: &str) -> Result<u32, EngineError> {
    match value.parse::<u32>() {
        Ok(v) if (1..=MAX_DIMENSION).contains(&v) => Ok(v),
        _ => Err(invalid(name, value)),
    }
}

fn invalid(name: &str, value: &str) -> EngineError {
    EngineError::InvalidParam {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Derivative cache file name for a parameter set.
///
/// SHA-256 over the sorted, form-encoded pairs, excluding the signature.
pub fn cache_key(params: &BTreeMap<String, String>) -> String {
    hex::encode(Sha256::digest(canonical_query(params).as_bytes()))
}
