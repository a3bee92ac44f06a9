//! # movehub-capture
//!
//! Turns upstream entity mutations into notification fan-outs.
//!
//! An [`EventCaptureAdapter`] selects one [`EventSource`] at startup:
//! the PostgreSQL change feed when its trigger is installed, the polling
//! fallback otherwise, or the in-memory feed for single-node runs. Every
//! source yields [`ChangeEvent`](movehub_core::events::ChangeEvent)s that
//! the [`ChangeHandler`] classifies and dispatches.

pub mod adapter;
pub mod handler;
pub mod source;
pub mod stats;

pub use adapter::{CaptureBackend, EventCaptureAdapter};
pub use handler::ChangeHandler;
pub use source::EventSource;
pub use stats::{AdapterStats, CaptureMode};
