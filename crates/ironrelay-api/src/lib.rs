//! # ironrelay-api
//!
//! HTTP API layer for IronRelay built on Axum.
//!
//! Provides the webhook ingestion endpoint, the JSON status endpoint, admin
//! job actions, request logging middleware, and error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, serve};
pub use error::ApiError;
pub use state::AppState;
