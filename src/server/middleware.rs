//! Axum adapter for [`ImagePipeline`].
//!
//! ```ignore
//! let app = Router::new()
//!     .fallback(fallback_handler)
//!     .layer(middleware::from_fn_with_state(pipeline, image_middleware));
//! ```

use axum::{
    extract::{OriginalUri, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::pipeline::{ImagePipeline, PipelineOutcome, RequestView};

/// Run the pipeline in front of the wrapped routes.
///
/// Forwarded requests reach `next` untouched.
pub async fn image_middleware(
    State(pipeline): State<ImagePipeline>,
    OriginalUri(original_uri): OriginalUri,
    request: Request,
    next: Next,
) -> Response {
    let view = RequestView::from_parts(&original_uri, request.headers());

    match pipeline.process(&view).await {
        Ok(PipelineOutcome::Respond(response)) => response,
        Ok(PipelineOutcome::Forward) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}
