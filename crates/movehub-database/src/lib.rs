//! # movehub-database
//!
//! Persistence for the notification subsystem. The [`store`] module defines
//! the traits every other crate programs against; [`repositories`] holds
//! the PostgreSQL implementations and [`memory`] the in-process ones used
//! for single-node runs and tests.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::{
    DirectoryStore, NotificationFilter, NotificationStore, SettingsStore, SortDirection,
};
