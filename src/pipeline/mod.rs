//! Image request pipeline.
//!
//! Each in-scope request runs through these stages in order. Any stage may
//! end the request early:
//!
//! ```text
//! ScopeMatcher ──miss──────────────────────────────────────────▶ Forward
//!      │
//! SignatureValidator ──missing/mismatch────────────────────────▶ Err(Signature)
//!      │
//! EngineFactory::create_engine ──error──┐
//!      │                                │
//! negotiate (cache TTL only) ──304──────┼──────────────────────▶ Respond(304)
//!      │                    ──error─────┤
//! ImageResponseResolver ──error─────────┴▶ FailureDispatcher ──▶ Forward | Respond | Err
//!      │
//! HeaderDecorator ─────────────────────────────────────────────▶ Respond(200)
//! ```
//!
//! The pipeline holds no locks; one instance serves concurrent requests.

mod conditional;
mod config;
mod failure;
mod headers;
mod request;
mod resolver;
mod scope;

use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use tracing::trace;

use crate::engine::{Engine, EngineFactory};
use crate::error::{ConfigError, FailureCause, PipelineError};
use crate::server::auth::SignedUrlAuth;

pub use conditional::{is_not_modified, negotiate, Negotiation};
pub use config::{PipelineConfig, SecurityConfig, DEFAULT_CACHE_TTL};
pub use failure::{
    FailureAction, FailureDispatcher, FailureEvent, FailureObserver, Handled,
    RESPONSE_FAILURE_EVENT,
};
pub use headers::{check_cache_ttl, format_epoch, HeaderDecorator, LAST_HTTP_DATE_SECS};
pub use request::RequestView;
pub use resolver::ImageResponseResolver;
pub use scope::ScopeMatcher;

/// What the host should do with a request.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Send this response
    Respond(Response),

    /// Hand the original request to the next handler
    Forward,
}

impl PipelineOutcome {
    pub fn is_forward(&self) -> bool {
        matches!(self, PipelineOutcome::Forward)
    }
}

#[derive(Clone)]
struct Inner {
    scope: ScopeMatcher,
    signer: Option<SignedUrlAuth>,
    engine: Arc<dyn EngineFactory>,
    cache_ttl: Option<Duration>,
    resolver: ImageResponseResolver,
    decorator: HeaderDecorator,
    failures: FailureDispatcher,
}

/// A configured image pipeline.
///
/// Cheap to clone; clones share configuration and observers.
#[derive(Clone)]
pub struct ImagePipeline {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ImagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePipeline")
            .field("scope", &self.inner.scope)
            .field("signed_urls", &self.inner.signer.is_some())
            .field("cache_ttl", &self.inner.cache_ttl)
            .field("resolver", &self.inner.resolver)
            .field("failures", &self.inner.failures)
            .finish_non_exhaustive()
    }
}

impl ImagePipeline {
    /// Validate a configuration and build the pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        if matches!(config.scope_prefix.as_deref(), Some("")) {
            return Err(ConfigError::EmptyScopePrefix);
        }

        if let Some(ttl) = config.cache_ttl {
            check_cache_ttl(ttl)?;
        }

        let signer = if config.security.signed_urls {
            let key = config
                .security
                .effective_key()
                .ok_or(ConfigError::MissingSignKey)?;
            Some(SignedUrlAuth::new(key))
        } else {
            None
        };

        let decorator = HeaderDecorator::new(config.cache_ttl, &config.headers)?;

        Ok(Self {
            inner: Arc::new(Inner {
                scope: ScopeMatcher::new(config.scope_prefix),
                signer,
                engine: config.engine,
                cache_ttl: config.cache_ttl,
                resolver: ImageResponseResolver::new(
                    config.allowed_params,
                    config.original_pass_through,
                ),
                decorator,
                failures: FailureDispatcher::new(config.debug),
            }),
        })
    }

    /// Register a failure observer.
    ///
    /// Observers run in registration order for every engine or source
    /// metadata failure. Signature errors are never observed.
    pub fn on_failure<F>(mut self, observer: F) -> Self
    where
        F: Fn(&FailureEvent<'_>) -> FailureAction + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.inner).failures.register(observer);
        self
    }

    /// Whether a decoded path is handled by this pipeline.
    pub fn in_scope(&self, decoded_path: &str) -> bool {
        self.inner.scope.matches(decoded_path)
    }

    /// Run a request through the pipeline.
    pub async fn process(&self, request: &RequestView) -> Result<PipelineOutcome, PipelineError> {
        let inner = &self.inner;

        if !inner.scope.matches(&request.path) {
            trace!(path = %request.path, "Out of scope");
            return Ok(PipelineOutcome::Forward);
        }

        if let Some(signer) = &inner.signer {
            signer.verify(&request.path, &request.query)?;
        }

        let engine = match inner.engine.create_engine() {
            Ok(engine) => engine,
            Err(err) => return self.fail(request, err.into()),
        };

        let modified_time = if inner.cache_ttl.is_some() {
            match negotiate(engine.as_ref(), request, &inner.decorator).await {
                Ok(Negotiation::NotModified(response)) => {
                    return Ok(PipelineOutcome::Respond(response))
                }
                Ok(Negotiation::Modified(modified_time)) => Some(modified_time),
                Err(err) => return self.fail(request, FailureCause::SourceMetadata(err)),
            }
        } else {
            None
        };

        self.respond(engine.as_ref(), request, modified_time).await
    }

    async fn respond(
        &self,
        engine: &dyn Engine,
        request: &RequestView,
        modified_time: Option<u64>,
    ) -> Result<PipelineOutcome, PipelineError> {
        match self.inner.resolver.resolve(engine, request).await {
            Ok(mut response) => {
                self.inner.decorator.decorate(&mut response, modified_time);
                Ok(PipelineOutcome::Respond(response))
            }
            Err(cause) => self.fail(request, cause),
        }
    }

    fn fail(
        &self,
        request: &RequestView,
        cause: FailureCause,
    ) -> Result<PipelineOutcome, PipelineError> {
        match self.inner.failures.dispatch(request, cause)? {
            Handled::Forward => Ok(PipelineOutcome::Forward),
            Handled::Respond(response) => Ok(PipelineOutcome::Respond(response)),
        }
    }
}
