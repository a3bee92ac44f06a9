//! # movehub-api
//!
//! HTTP API layer for the MoveHub notification subsystem built on Axum.
//!
//! Provides the recipient and admin REST endpoints, the gateway identity
//! extractor, DTOs, and error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{Stores, build_app, build_state};
pub use error::ApiError;
pub use state::AppState;
