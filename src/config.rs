//! Command-line configuration for the `imgpipe` binary.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `IMGPIPE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `IMGPIPE_HOST` - Server bind address (default: 0.0.0.0)
//! - `IMGPIPE_PORT` - Server port (default: 3000)
//! - `IMGPIPE_SOURCE_DIR` - Directory holding original images (required)
//! - `IMGPIPE_CACHE_DIR` - Directory derivatives are written to (required)
//! - `IMGPIPE_BASE_URL` - URL prefix stripped before resolving source files
//! - `IMGPIPE_SCOPE_PREFIX` - Only paths starting with this are handled
//! - `IMGPIPE_CACHE_TTL` - Browser cache lifetime (default: `+1 days`; `off` disables)
//! - `IMGPIPE_ALLOWED_PARAMS` - Comma-separated manipulation parameters to accept
//! - `IMGPIPE_HEADERS` - `Name: value` headers, separated by `;`
//! - `IMGPIPE_PASS_THROUGH` - Stream originals when no manipulation is requested
//! - `IMGPIPE_SIGNED_URLS` - Require signed URLs
//! - `IMGPIPE_SIGN_KEY` - Signature key
//! - `IMGPIPE_APP_SECRET` - Fallback secret when no sign key is set
//! - `IMGPIPE_CORS_ORIGINS` - Comma-separated allowed CORS origins
//! - `IMGPIPE_DEBUG` - Expose failure causes in error responses

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::engine::EngineConfig;
use crate::pipeline::{check_cache_ttl, PipelineConfig};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default cache TTL expression.
pub const DEFAULT_CACHE_TTL: &str = "+1 days";

// =============================================================================
// CLI Arguments
// =============================================================================

/// imgpipe - resized images over HTTP with signed URLs and conditional caching.
#[derive(Parser, Debug, Clone)]
#[command(name = "imgpipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeConfig),

    /// Print a signed URL for an image
    Sign(SignConfig),
}

/// Options for `imgpipe serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "IMGPIPE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IMGPIPE_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding the original images.
    #[arg(long, env = "IMGPIPE_SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Directory derivatives are written to.
    #[arg(long, env = "IMGPIPE_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// URL prefix stripped from request paths before resolving source files.
    #[arg(long, env = "IMGPIPE_BASE_URL")]
    pub base_url: Option<String>,

    // =========================================================================
    // Pipeline Configuration
    // =========================================================================
    /// Only handle request paths starting with this prefix.
    ///
    /// If not specified, every path is handled.
    #[arg(long, env = "IMGPIPE_SCOPE_PREFIX")]
    pub scope_prefix: Option<String>,

    /// Browser cache lifetime, e.g. `+1 days`, `2h`, `3600`. `off` disables
    /// conditional requests and cache headers.
    #[arg(long, default_value = DEFAULT_CACHE_TTL, env = "IMGPIPE_CACHE_TTL")]
    pub cache_ttl: String,

    /// Manipulation parameters to accept (comma-separated). Others are ignored.
    #[arg(long, env = "IMGPIPE_ALLOWED_PARAMS", value_delimiter = ',')]
    pub allowed_params: Option<Vec<String>>,

    /// Extra response header as `Name: value`. Repeatable.
    #[arg(long = "header", env = "IMGPIPE_HEADERS", value_delimiter = ';')]
    pub headers: Vec<String>,

    /// Stream the original file when no manipulation is requested.
    #[arg(long, env = "IMGPIPE_PASS_THROUGH")]
    pub pass_through: bool,

    // =========================================================================
    // Signing Configuration
    // =========================================================================
    /// Require a valid signature on every image request.
    #[arg(long, env = "IMGPIPE_SIGNED_URLS")]
    pub signed_urls: bool,

    /// Key for HMAC-SHA256 signatures.
    #[arg(long, env = "IMGPIPE_SIGN_KEY")]
    pub sign_key: Option<String>,

    /// Application secret used when no sign key is given.
    #[arg(long, env = "IMGPIPE_APP_SECRET")]
    pub app_secret: Option<String>,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "IMGPIPE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Include failure causes in error responses. Not for production.
    #[arg(long, env = "IMGPIPE_DEBUG")]
    pub debug: bool,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(
                "Source directory is required. Set --source-dir or IMGPIPE_SOURCE_DIR".to_string(),
            );
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(
                "Cache directory is required. Set --cache-dir or IMGPIPE_CACHE_DIR".to_string(),
            );
        }

        if self.signed_urls && self.sign_key.is_none() && self.app_secret.is_none() {
            return Err(
                "Signed URLs are enabled but no secret provided. \
                 Set --sign-key or IMGPIPE_SIGN_KEY (or --app-secret)"
                    .to_string(),
            );
        }

        if matches!(self.scope_prefix.as_deref(), Some("")) {
            return Err("scope_prefix must not be empty".to_string());
        }

        if let Some(ttl) = self.ttl()? {
            check_cache_ttl(ttl).map_err(|e| e.to_string())?;
        }
        self.parsed_headers()?;

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parsed cache TTL; `None` when caching is disabled.
    pub fn ttl(&self) -> Result<Option<Duration>, String> {
        parse_ttl(&self.cache_ttl)
    }

    /// Parsed `--header` values in the order given.
    pub fn parsed_headers(&self) -> Result<Vec<(String, String)>, String> {
        self.headers
            .iter()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_header(raw))
            .collect()
    }

    /// Engine settings for the filesystem engine.
    pub fn engine_config(&self) -> EngineConfig {
        let engine = EngineConfig::new(&self.source_dir, &self.cache_dir);
        match &self.base_url {
            Some(base_url) => engine.with_base_url(base_url),
            None => engine,
        }
    }

    /// Pipeline settings (call validate() first).
    pub fn pipeline_config(&self) -> Result<PipelineConfig, String> {
        let mut config = PipelineConfig::new(self.engine_config())
            .with_signed_urls(self.signed_urls)
            .with_original_pass_through(self.pass_through)
            .with_debug(self.debug);

        config = match self.ttl()? {
            Some(ttl) => config.with_cache_ttl(ttl),
            None => config.without_cache(),
        };

        if let Some(prefix) = &self.scope_prefix {
            config = config.with_scope_prefix(prefix);
        }
        if let Some(key) = &self.sign_key {
            config = config.with_sign_key(key);
        }
        if let Some(secret) = &self.app_secret {
            config = config.with_app_secret(secret);
        }
        if let Some(params) = &self.allowed_params {
            config = config.with_allowed_params(
                params
                    .iter()
                    .map(|p| p.trim())
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            );
        }
        for (name, value) in self.parsed_headers()? {
            config = config.with_header(name, value);
        }

        Ok(config)
    }
}

/// Options for `imgpipe sign`.
#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Image path to sign (e.g. `/img/cake.png`).
    #[arg(long)]
    pub path: String,

    /// Manipulation parameter as `key=value`. Repeatable.
    #[arg(short = 'p', long = "param")]
    pub params: Vec<String>,

    /// Signing key; must match the server's.
    #[arg(long, env = "IMGPIPE_SIGN_KEY")]
    pub secret: String,

    /// Prefix for the printed URL (e.g. `https://cdn.example.com`).
    #[arg(long)]
    pub base_url: Option<String>,
}

impl SignConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret is required. Set --secret or IMGPIPE_SIGN_KEY".to_string());
        }
        if !self.path.starts_with('/') {
            return Err(format!("Path must start with '/': {}", self.path));
        }
        Ok(())
    }

    /// Parse `--param key=value` pairs. A repeated key keeps its last value.
    pub fn parse_params(&self) -> Result<BTreeMap<String, String>, String> {
        self.params
            .iter()
            .map(|raw| match raw.split_once('=') {
                Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
                _ => Err(format!("Invalid parameter '{}': expected key=value", raw)),
            })
            .collect()
    }
}

// =============================================================================
// Parsing Helpers
// =============================================================================

/// Parse a cache TTL such as `+1 days`, `2h`, `90 minutes` or `3600`.
///
/// Bare integers are seconds. `0`, `off` and `none` disable caching.
pub fn parse_ttl(raw: &str) -> Result<Option<Duration>, String> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let value = value.strip_prefix('+').unwrap_or(value).trim_start();
    let ttl = if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| format!("Invalid cache TTL '{}': {}", raw, e))?
    } else {
        humantime::parse_duration(value)
            .map_err(|e| format!("Invalid cache TTL '{}': {}", raw, e))?
    };

    Ok((!ttl.is_zero()).then_some(ttl))
}

/// Parse a `Name: value` header.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("Invalid header '{}': expected 'Name: value'", raw)),
    }
}

// =============================================================================
// Tests
// =============================================================================
