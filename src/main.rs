//! imgpipe - resized images over HTTP.
//!
//! This binary starts the HTTP server or prints signed URLs.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imgpipe::{
    config::{Cli, Command, ServeConfig, SignConfig},
    pipeline::{FailureAction, ImagePipeline},
    server::{auth::SignedUrlAuth, create_router, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Sign(config) => run_sign(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let pipeline_config = match config.pipeline_config() {
        Ok(pipeline_config) => pipeline_config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Source dir: {}", config.source_dir.display());
    info!("  Cache dir: {}", config.cache_dir.display());
    if let Some(ref base_url) = config.base_url {
        info!("  Base URL: {}", base_url);
    }
    match config.scope_prefix {
        Some(ref prefix) => info!("  Scope: {}", prefix),
        None => info!("  Scope: all paths"),
    }
    match pipeline_config.cache_ttl {
        Some(ttl) => info!("  Cache TTL: {}s", ttl.as_secs()),
        None => info!("  Cache TTL: disabled"),
    }
    if config.signed_urls {
        info!("  Signed URLs: enabled");
    } else {
        warn!("  Signed URLs: DISABLED - any parameter combination can be requested");
    }
    if config.debug {
        warn!("  Debug mode: failure causes are exposed to clients");
    }

    let pipeline = match ImagePipeline::new(pipeline_config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Missing sources fall through to the 404 handler instead of a 500.
    let pipeline = pipeline.on_failure(|event| {
        if event.cause.is_not_found() {
            FailureAction::Stop
        } else {
            FailureAction::Continue
        }
    });

    let router = create_router(pipeline, build_router_config(&config));
    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "imgpipe=debug,tower_http=debug"
    } else {
        "imgpipe=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new();

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let params = match config.parse_params() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let auth = SignedUrlAuth::new(&config.secret);
    let base_url = config.base_url.as_deref().unwrap_or("");
    println!(
        "{}",
        auth.generate_signed_url(base_url, &config.path, &params)
    );

    if config.base_url.is_none() {
        eprintln!();
        eprintln!("Tip: Use --base-url to generate a complete URL");
    }

    ExitCode::SUCCESS
}
