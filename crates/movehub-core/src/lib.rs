//! # movehub-core
//!
//! Core crate for MoveHub. Contains configuration schemas, typed
//! identifiers, the notification vocabulary shared by every layer,
//! upstream change events, pagination types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other MoveHub crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
