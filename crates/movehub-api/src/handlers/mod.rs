//! Route handlers organized by audience.

pub mod admin;
pub mod health;
pub mod notification;
