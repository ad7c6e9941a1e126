//! HTTP server module
//!
//! - Axum router with the `/info` and `/download` endpoints
//! - Health and version endpoints
//! - Error to response mapping
//! - CORS and request tracing middleware

pub mod handlers;
pub mod routes;

pub use routes::create_router;
