//! Failure dispatch tests.
//!
//! Tests verify:
//! - Unhandled failures become a generic 500
//! - Debug mode exposes the original cause
//! - Observers can forward (stop) or answer with their own response

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;

use imgpipe::{
    Engine, EngineError, FailureAction, FailureCause, ImagePipeline, PipelineConfig, SourceError,
};

use super::test_utils::{body_bytes, body_json, get, router, router_for, Fixture};

fn teapot(body: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::IM_A_TEAPOT;
    response
        .headers_mut()
        .insert("x-fallback", "yes".parse().unwrap());
    response
}

// =============================================================================
// Unhandled Failures
// =============================================================================

#[tokio::test]
async fn test_missing_source_is_response_failure() {
    let fixture = Fixture::new();
    let router = router(PipelineConfig::new(fixture.engine()));

    let response = get(&router, "/images/missing.png?w=10").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "response_failure");
    assert_eq!(json["message"], "Unable to generate image response");
}

#[tokio::test]
async fn test_missing_source_without_cache_is_response_failure() {
    let fixture = Fixture::new();
    let router = router(PipelineConfig::new(fixture.engine()).without_cache());

    let response = get(&router, "/images/missing.png?w=10").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_debug_mode_exposes_cause() {
    let fixture = Fixture::new();
    let router = router(PipelineConfig::new(fixture.engine()).with_debug(true));

    let response = get(&router, "/images/missing.png?w=10").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert!(json["message"].as_str().unwrap().contains("missing.png"));
}

#[tokio::test]
async fn test_debug_mode_invalid_param() {
    let fixture = Fixture::new();
    fixture.add_png("logo.png", 40, 20);
    let router = router(PipelineConfig::new(fixture.engine()).with_debug(true));

    let response = get(&router, "/images/logo.png?w=wide").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_param");
    assert_eq!(fixture.derivative_count("logo.png"), 0);
}

#[tokio::test]
async fn test_corrupt_source_is_response_failure() {
    let fixture = Fixture::new();
    fixture.add_file("broken.png", b"definitely not a png");
    let router = router(PipelineConfig::new(fixture.engine()));

    let response = get(&router, "/images/broken.png?w=10").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_engine_factory_failure_is_dispatched() {
    let factory = || -> Result<Arc<dyn Engine>, EngineError> {
        Err(EngineError::Unavailable("storage offline".into()))
    };
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);

    let pipeline = ImagePipeline::new(PipelineConfig::new(factory))
        .unwrap()
        .on_failure(move |event| {
            if matches!(
                event.cause,
                FailureCause::Engine(EngineError::Unavailable(_))
            ) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            FailureAction::Continue
        });
    let router = router_for(pipeline);

    let response = get(&router, "/images/logo.png").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Observers
// =============================================================================

#[tokio::test]
async fn test_stop_forwards_to_next_handler() {
    let fixture = Fixture::new();
    let pipeline = ImagePipeline::new(PipelineConfig::new(fixture.engine()))
        .unwrap()
        .on_failure(|_| FailureAction::Stop);
    let router = router_for(pipeline);

    let response = get(&router, "/images/missing.png?w=10").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert!(json["message"].as_str().unwrap().starts_with("No route"));
}

#[tokio::test]
async fn test_stop_on_engine_failure_forwards() {
    let fixture = Fixture::new();
    fixture.add_file("broken.png", b"definitely not a png");
    let pipeline = ImagePipeline::new(PipelineConfig::new(fixture.engine()))
        .unwrap()
        .on_failure(|event| match event.cause {
            FailureCause::Engine(EngineError::Decode { .. }) => FailureAction::Stop,
            _ => FailureAction::Continue,
        });
    let router = router_for(pipeline);

    let response = get(&router, "/images/broken.png?w=10").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_observer_response_is_returned() {
    let fixture = Fixture::new();
    let pipeline = ImagePipeline::new(
        PipelineConfig::new(fixture.engine()).with_header("X-Custom", "v"),
    )
    .unwrap()
    .on_failure(|event| {
        assert_eq!(event.request.path, "/images/missing.png");
        assert_eq!(
            event.request.query.get("w").map(String::as_str),
            Some("10")
        );
        FailureAction::Respond(teapot("fallback image"))
    });
    let router = router_for(pipeline);

    let response = get(&router, "/images/missing.png?w=10").await;

    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.headers()["x-fallback"], "yes");
    assert!(!response.headers().contains_key("x-custom"));
    assert_eq!(body_bytes(response).await.as_ref(), b"fallback image");
}

#[tokio::test]
async fn test_first_response_wins() {
    let fixture = Fixture::new();
    let pipeline = ImagePipeline::new(PipelineConfig::new(fixture.engine()))
        .unwrap()
        .on_failure(|_| FailureAction::Continue)
        .on_failure(|_| FailureAction::Respond(teapot("first")))
        .on_failure(|_| FailureAction::Respond(Response::new(Body::from("second"))));
    let router = router_for(pipeline);

    let response = get(&router, "/images/missing.png").await;

    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body_bytes(response).await.as_ref(), b"first");
}

#[tokio::test]
async fn test_stop_after_response_forwards() {
    let fixture = Fixture::new();
    let pipeline = ImagePipeline::new(PipelineConfig::new(fixture.engine()))
        .unwrap()
        .on_failure(|_| FailureAction::Respond(teapot("ignored")))
        .on_failure(|_| FailureAction::Stop);
    let router = router_for(pipeline);

    let response = get(&router, "/images/missing.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_not_found_observer_only_handles_missing_sources() {
    let fixture = Fixture::new();
    fixture.add_file("broken.png", b"definitely not a png");
    let pipeline = ImagePipeline::new(PipelineConfig::new(fixture.engine()))
        .unwrap()
        .on_failure(|event| {
            if event.cause.is_not_found() {
                FailureAction::Stop
            } else {
                FailureAction::Continue
            }
        });
    let router = router_for(pipeline);

    let missing = get(&router, "/images/missing.png?w=10").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let broken = get(&router, "/images/broken.png?w=10").await;
    assert_eq!(broken.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_metadata_failure_reports_source_cause() {
    let fixture = Fixture::new();
    let pipeline = ImagePipeline::new(PipelineConfig::new(fixture.engine()))
        .unwrap()
        .on_failure(|event| match event.cause {
            FailureCause::SourceMetadata(SourceError::NotFound(path)) if path == "missing.png" => {
                FailureAction::Stop
            }
            _ => FailureAction::Continue,
        });
    let router = router_for(pipeline);

    let response = get(&router, "/images/missing.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
