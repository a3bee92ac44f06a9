//! Upstream entity change events.
//!
//! A [`ChangeEvent`] is what the database trigger publishes on the change
//! feed channel and what the in-memory feed broadcasts. Polling synthesizes
//! the same shape from query predicates, so the capture handler only ever
//! consumes this type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// PostgreSQL `NOTIFY` channel carrying change events.
pub const CHANGE_CHANNEL: &str = "movehub_entity_changes";

/// Upstream entity kinds watched by the capture adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A user account.
    User,
    /// A quotation document.
    Quotation,
    /// A receipt document.
    Receipt,
}

impl EntityKind {
    /// Return the kind as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Quotation => "quotation",
            Self::Receipt => "receipt",
        }
    }

    /// Whether this kind is a business document rather than an account.
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Quotation | Self::Receipt)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" | "users" => Ok(Self::User),
            "quotation" | "quotations" => Ok(Self::Quotation),
            "receipt" | "receipts" => Ok(Self::Receipt),
            _ => Err(AppError::validation(format!("Unknown entity kind: '{s}'"))),
        }
    }
}

/// Kind of mutation observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
    /// A time-based deadline on the row passed without a write; only
    /// polling produces these.
    Lapsed,
}

/// A single upstream mutation.
///
/// `before` is present for updates and deletes, `after` for inserts,
/// updates, and lapses. Both are the row serialized as JSON and either may
/// be missing when the trigger dropped an oversized payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Entity kind.
    pub entity: EntityKind,
    /// Mutation kind.
    pub operation: ChangeOperation,
    /// Entity identifier.
    pub id: Uuid,
    /// Row image before the mutation.
    #[serde(default)]
    pub before: Option<serde_json::Value>,
    /// Row image after the mutation.
    #[serde(default)]
    pub after: Option<serde_json::Value>,
    /// When the mutation was observed.
    #[serde(default = "Utc::now")]
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    /// An insert event carrying the new row.
    pub fn insert(entity: EntityKind, id: Uuid, after: serde_json::Value) -> Self {
        Self {
            entity,
            operation: ChangeOperation::Insert,
            id,
            before: None,
            after: Some(after),
            at: Utc::now(),
        }
    }

    /// An update event carrying both row images.
    pub fn update(
        entity: EntityKind,
        id: Uuid,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self {
            entity,
            operation: ChangeOperation::Update,
            id,
            before: Some(before),
            after: Some(after),
            at: Utc::now(),
        }
    }

    /// A delete event; only the identifier is guaranteed.
    pub fn delete(entity: EntityKind, id: Uuid) -> Self {
        Self {
            entity,
            operation: ChangeOperation::Delete,
            id,
            before: None,
            after: None,
            at: Utc::now(),
        }
    }

    /// A deadline event carrying the current row.
    pub fn lapsed(entity: EntityKind, id: Uuid, current: serde_json::Value) -> Self {
        Self {
            entity,
            operation: ChangeOperation::Lapsed,
            id,
            before: None,
            after: Some(current),
            at: Utc::now(),
        }
    }
}
