//! Pipeline configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::EngineFactory;

/// Default cache TTL (one day).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Signed URL settings.
#[derive(Clone, Default)]
pub struct SecurityConfig {
    /// Require a valid `s` parameter on every in-scope request
    pub signed_urls: bool,

    /// Key used to verify signatures
    pub sign_key: Option<String>,

    /// Application-wide secret used when no sign key is set
    pub app_secret: Option<String>,
}

impl SecurityConfig {
    /// The key signatures are checked against.
    pub fn effective_key(&self) -> Option<&str> {
        let non_empty = |key: &&str| !key.is_empty();
        self.sign_key
            .as_deref()
            .filter(non_empty)
            .or_else(|| self.app_secret.as_deref().filter(non_empty))
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("signed_urls", &self.signed_urls)
            .field("sign_key", &self.sign_key.as_ref().map(|_| "[REDACTED]"))
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Immutable per-pipeline configuration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use imgpipe::{EngineConfig, PipelineConfig};
///
/// let config = PipelineConfig::new(EngineConfig::new("/srv/images", "/var/cache/images"))
///     .with_scope_prefix("/images/")
///     .with_cache_ttl(Duration::from_secs(3600))
///     .with_allowed_params(["w", "h", "fm"])
///     .with_header("X-Served-By", "imgpipe");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Path prefix the pipeline handles; `None` handles everything
    pub scope_prefix: Option<String>,

    /// Cache TTL; `None` disables conditional requests and cache headers
    pub cache_ttl: Option<Duration>,

    /// Produces the engine, once per request
    pub engine: Arc<dyn EngineFactory>,

    pub security: SecurityConfig,

    /// Query parameters forwarded to the engine; `None` forwards all
    pub allowed_params: Option<BTreeSet<String>>,

    /// Headers applied last, in order
    pub headers: Vec<(String, String)>,

    /// Stream the original file when no manipulation is requested
    pub original_pass_through: bool,

    /// Re-raise unhandled failures with their original cause
    pub debug: bool,
}

impl PipelineConfig {
    pub fn new(engine: impl EngineFactory + 'static) -> Self {
        Self {
            scope_prefix: None,
            cache_ttl: Some(DEFAULT_CACHE_TTL),
            engine: Arc::new(engine),
            security: SecurityConfig::default(),
            allowed_params: None,
            headers: Vec::new(),
            original_pass_through: false,
            debug: false,
        }
    }

    pub fn with_scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.scope_prefix = Some(prefix.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Disable conditional requests and cache headers.
    pub fn without_cache(mut self) -> Self {
        self.cache_ttl = None;
        self
    }

    pub fn with_signed_urls(mut self, enabled: bool) -> Self {
        self.security.signed_urls = enabled;
        self
    }

    pub fn with_sign_key(mut self, key: impl Into<String>) -> Self {
        self.security.sign_key = Some(key.into());
        self
    }

    /// Secret used for signatures when no sign key is configured.
    pub fn with_app_secret(mut self, secret: impl Into<String>) -> Self {
        self.security.app_secret = Some(secret.into());
        self
    }

    /// Restrict the query parameters the engine sees. An empty list keeps
    /// every parameter.
    pub fn with_allowed_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: BTreeSet<String> = params.into_iter().map(Into::into).collect();
        self.allowed_params = (!allowed.is_empty()).then_some(allowed);
        self
    }

    /// Append a custom header. A later header with the same name wins.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_original_pass_through(mut self, enabled: bool) -> Self {
        self.original_pass_through = enabled;
        self
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("scope_prefix", &self.scope_prefix)
            .field("cache_ttl", &self.cache_ttl)
            .field("security", &self.security)
            .field("allowed_params", &self.allowed_params)
            .field("headers", &self.headers)
            .field("original_pass_through", &self.original_pass_through)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}
