//! Axum HTTP server, routing, and handlers.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Inject shared application state (`AppState`) into handlers.
//! - Map core errors onto [`common::ServiceError`] status codes.

pub mod handlers;
pub mod router;
pub mod state;
