//! # movehub-entity
//!
//! Domain entity models for MoveHub. Upstream entities (users, quotations,
//! receipts) are read-only table rows for the notification subsystem and
//! derive `sqlx::FromRow`. The notification model owns the fan-out and
//! read-state invariants.

pub mod document;
pub mod notification;
pub mod schema;
pub mod settings;
pub mod user;
