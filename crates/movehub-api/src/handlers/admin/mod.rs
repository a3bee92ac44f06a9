//! Admin-only handlers. Every handler checks the admin role first.

pub mod jobs;
pub mod notifications;
pub mod settings;
pub mod system;
