//! Signed URL integration tests.
//!
//! Tests verify:
//! - Valid signatures are accepted
//! - Missing and mismatched signatures are rejected with distinct errors
//! - Rejected requests never reach the engine
//! - Signature failures bypass failure observers

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;

use imgpipe::{FailureAction, ImagePipeline, PipelineConfig, SignedUrlAuth};

use super::test_utils::{body_json, get, router, router_for, CountingFactory, Fixture};

const SECRET: &str = "test-secret-key";

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn signed_config(factory: CountingFactory) -> PipelineConfig {
    PipelineConfig::new(factory)
        .with_signed_urls(true)
        .with_sign_key(SECRET)
}

// =============================================================================
// Accepted Signatures
// =============================================================================

#[tokio::test]
async fn test_valid_signature_succeeds() {
    let fixture = Fixture::new();
    fixture.add_png("logo.png", 40, 20);
    let factory = CountingFactory::new(fixture.engine());
    let router = router(signed_config(factory.clone()));

    let auth = SignedUrlAuth::new(SECRET);
    let uri = auth.generate_signed_url("", "/images/logo.png", &params(&[("w", "10")]));

    let response = get(&router, &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(factory.render_count(), 1);
}

#[tokio::test]
async fn test_valid_signature_on_encoded_path() {
    let fixture = Fixture::new();
    fixture.add_png("cake logo.png", 40, 20);
    let router = router(signed_config(CountingFactory::new(fixture.engine())));

    let auth = SignedUrlAuth::new(SECRET);
    let uri = auth.generate_signed_url("", "/images/cake logo.png", &params(&[("w", "10")]));
    assert!(uri.starts_with("/images/cake%20logo.png?"));

    let response = get(&router, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signature_without_params_allows_pass_through() {
    let fixture = Fixture::new();
    let size = fixture.add_png("logo.png", 40, 20);
    let factory = CountingFactory::new(fixture.engine());
    let router = router(signed_config(factory.clone()).with_original_pass_through(true));

    let auth = SignedUrlAuth::new(SECRET);
    let uri = auth.generate_signed_url("", "/images/logo.png", &BTreeMap::new());

    let response = get(&router, &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-length"], size.to_string().as_str());
    assert_eq!(factory.render_count(), 0);
}

#[tokio::test]
async fn test_app_secret_is_used_without_sign_key() {
    let fixture = Fixture::new();
    fixture.add_png("logo.png", 40, 20);
    let router = router(
        PipelineConfig::new(fixture.engine())
            .with_signed_urls(true)
            .with_app_secret("app-secret"),
    );

    let uri = SignedUrlAuth::new("app-secret").generate_signed_url(
        "",
        "/images/logo.png",
        &params(&[("w", "10")]),
    );
    assert_eq!(get(&router, &uri).await.status(), StatusCode::OK);

    let uri = SignedUrlAuth::new(SECRET).generate_signed_url(
        "",
        "/images/logo.png",
        &params(&[("w", "10")]),
    );
    assert_eq!(get(&router, &uri).await.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Rejected Signatures
// =============================================================================

#[tokio::test]
async fn test_missing_signature_rejected_before_engine() {
    let fixture = Fixture::new();
    fixture.add_png("logo.png", 40, 20);
    let factory = CountingFactory::new(fixture.engine());
    let router = router(signed_config(factory.clone()));

    let response = get(&router, "/images/logo.png?w=10").await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "missing_signature");
    assert_eq!(json["message"], "Signature is missing.");
    assert_eq!(json["status"], 403);

    assert_eq!(factory.created_count(), 0);
    assert!(fixture.cache_is_empty());
}

#[tokio::test]
async fn test_wrong_signature_rejected() {
    let fixture = Fixture::new();
    fixture.add_png("logo.png", 40, 20);
    let factory = CountingFactory::new(fixture.engine());
    let router = router(signed_config(factory.clone()));

    let response = get(
        &router,
        "/images/logo.png?w=10&s=0000000000000000000000000000000000000000000000000000000000000000",
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_signature");
    assert_eq!(json["message"], "Signature is not valid.");
    assert_eq!(factory.render_count(), 0);
    assert!(fixture.cache_is_empty());
}

#[tokio::test]
async fn test_invalid_hex_signature_rejected() {
    let fixture = Fixture::new();
    let router = router(signed_config(CountingFactory::new(fixture.engine())));

    let response = get(&router, "/images/logo.png?w=10&s=not-hex").await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "invalid_signature");
}

#[tokio::test]
async fn test_tampered_param_rejected() {
    let fixture = Fixture::new();
    fixture.add_png("logo.png", 40, 20);
    let router = router(signed_config(CountingFactory::new(fixture.engine())));

    let auth = SignedUrlAuth::new(SECRET);
    let uri = auth.generate_signed_url("", "/images/logo.png", &params(&[("w", "10")]));
    let tampered = uri.replace("w=10", "w=4000");

    let response = get(&router, &tampered).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_signature_binds_to_path() {
    let fixture = Fixture::new();
    fixture.add_png("logo.png", 40, 20);
    fixture.add_png("other.png", 40, 20);
    let router = router(signed_config(CountingFactory::new(fixture.engine())));

    let auth = SignedUrlAuth::new(SECRET);
    let uri = auth.generate_signed_url("", "/images/logo.png", &params(&[("w", "10")]));
    let moved = uri.replace("logo.png", "other.png");

    let response = get(&router, &moved).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_signature_from_different_key_rejected() {
    let fixture = Fixture::new();
    fixture.add_png("logo.png", 40, 20);
    let router = router(signed_config(CountingFactory::new(fixture.engine())));

    let uri = SignedUrlAuth::new("another-key").generate_signed_url(
        "",
        "/images/logo.png",
        &params(&[("w", "10")]),
    );

    let response = get(&router, &uri).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_signature_errors_bypass_observers() {
    let fixture = Fixture::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let pipeline = ImagePipeline::new(signed_config(CountingFactory::new(fixture.engine())))
        .unwrap()
        .on_failure(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            FailureAction::Stop
        });
    let router = router_for(pipeline);

    let response = get(&router, "/images/logo.png?w=10").await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_out_of_scope_needs_no_signature() {
    let fixture = Fixture::new();
    let router = router(
        signed_config(CountingFactory::new(fixture.engine())).with_scope_prefix("/images/"),
    );

    let response = get(&router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&router, "/static/app.js").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}
