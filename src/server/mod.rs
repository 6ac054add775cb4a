//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │ middleware  │  │    auth     │  │        routes           │  │
//! │  │ (pipeline)  │  │ (signed URL)│  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! │                   ┌─────────────┐                               │
//! │                   │  handlers   │  health, 404, JSON errors     │
//! │                   └─────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use auth::{SignedUrlAuth, SIGNATURE_PARAM};
pub use handlers::{fallback_handler, health_handler, ErrorResponse, HealthResponse};
pub use middleware::image_middleware;
pub use routes::{create_router, RouterConfig};
