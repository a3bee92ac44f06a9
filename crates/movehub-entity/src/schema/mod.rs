//! Declarative field labels for upstream entities.
//!
//! Generic "updated" notifications list the labelled fields whose value
//! changed. Unlisted columns (timestamps, internal ids) never show up in a
//! diff and on their own do not produce a notification.

use movehub_core::events::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A watched column and its human label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLabel {
    /// Column name in the row image.
    pub field: &'static str,
    /// Label shown in notification metadata.
    pub label: &'static str,
}

/// One changed field in a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Column name.
    pub field: String,
    /// Human label.
    pub label: String,
    /// New value.
    pub value: Value,
}

/// The labelled fields of one entity kind.
#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    /// Entity kind described.
    pub entity: EntityKind,
    /// Watched fields in display order.
    pub fields: &'static [FieldLabel],
}

const fn f(field: &'static str, label: &'static str) -> FieldLabel {
    FieldLabel { field, label }
}

static USER_SCHEMA: EntitySchema = EntitySchema {
    entity: EntityKind::User,
    fields: &[
        f("username", "Username"),
        f("email", "Email"),
        f("display_name", "Display name"),
        f("phone", "Phone"),
        f("role", "Role"),
        f("status", "Status"),
    ],
};

static QUOTATION_SCHEMA: EntitySchema = EntitySchema {
    entity: EntityKind::Quotation,
    fields: &[
        f("number", "Quotation number"),
        f("customer_name", "Customer"),
        f("status", "Status"),
        f("valid_until", "Valid until"),
        f("total_amount", "Total amount"),
        f("origin_address", "Pickup address"),
        f("destination_address", "Delivery address"),
        f("moving_date", "Moving date"),
        f("notes", "Notes"),
    ],
};

static RECEIPT_SCHEMA: EntitySchema = EntitySchema {
    entity: EntityKind::Receipt,
    fields: &[
        f("number", "Receipt number"),
        f("customer_name", "Customer"),
        f("payment_status", "Payment status"),
        f("due_date", "Due date"),
        f("amount", "Amount"),
        f("payment_method", "Payment method"),
    ],
};

impl EntitySchema {
    /// Schema for an entity kind.
    pub fn for_entity(entity: EntityKind) -> &'static EntitySchema {
        match entity {
            EntityKind::User => &USER_SCHEMA,
            EntityKind::Quotation => &QUOTATION_SCHEMA,
            EntityKind::Receipt => &RECEIPT_SCHEMA,
        }
    }

    /// Label for a field, if it is watched.
    pub fn label(&self, field: &str) -> Option<&'static str> {
        self.fields.iter().find(|l| l.field == field).map(|l| l.label)
    }

    /// Labelled fields whose value differs between two row images.
    ///
    /// A field absent from a row image counts as `null`.
    pub fn diff(&self, before: &Value, after: &Value) -> Vec<FieldChange> {
        self.fields
            .iter()
            .filter_map(|l| {
                let old = before.get(l.field).unwrap_or(&Value::Null);
                let new = after.get(l.field).unwrap_or(&Value::Null);
                (old != new).then(|| FieldChange {
                    field: l.field.to_string(),
                    label: l.label.to_string(),
                    value: new.clone(),
                })
            })
            .collect()
    }
}
