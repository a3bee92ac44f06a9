//! Typed row images.

use serde_json::{Value, json};
use uuid::Uuid;

use movehub_core::events::EntityKind;
use movehub_core::result::AppResult;
use movehub_core::types::{QuotationId, ReceiptId, UserId};
use movehub_database::DirectoryStore;
use movehub_entity::document::{Quotation, Receipt};
use movehub_entity::user::User;

/// An upstream row decoded into its entity type.
#[derive(Debug, Clone)]
pub enum Snapshot {
    /// A user row.
    User(User),
    /// A quotation row.
    Quotation(Quotation),
    /// A receipt row.
    Receipt(Receipt),
}

impl Snapshot {
    /// Decode a JSON row image.
    pub fn decode(entity: EntityKind, image: &Value) -> AppResult<Self> {
        Ok(match entity {
            EntityKind::User => Self::User(serde_json::from_value(image.clone())?),
            EntityKind::Quotation => Self::Quotation(serde_json::from_value(image.clone())?),
            EntityKind::Receipt => Self::Receipt(serde_json::from_value(image.clone())?),
        })
    }

    /// Read the current row from the directory.
    pub async fn load(
        directory: &dyn DirectoryStore,
        entity: EntityKind,
        id: Uuid,
    ) -> AppResult<Option<Self>> {
        Ok(match entity {
            EntityKind::User => directory
                .find_user(UserId::from_uuid(id))
                .await?
                .map(Self::User),
            EntityKind::Quotation => directory
                .find_quotation(QuotationId::from_uuid(id))
                .await?
                .map(Self::Quotation),
            EntityKind::Receipt => directory
                .find_receipt(ReceiptId::from_uuid(id))
                .await?
                .map(Self::Receipt),
        })
    }

    /// Serialize back to a JSON row image.
    pub fn to_image(&self) -> AppResult<Value> {
        Ok(match self {
            Self::User(u) => serde_json::to_value(u)?,
            Self::Quotation(q) => serde_json::to_value(q)?,
            Self::Receipt(r) => serde_json::to_value(r)?,
        })
    }

    /// Entity kind.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Quotation(_) => EntityKind::Quotation,
            Self::Receipt(_) => EntityKind::Receipt,
        }
    }

    /// Entity identifier.
    pub fn id(&self) -> Uuid {
        match self {
            Self::User(u) => u.id.into_uuid(),
            Self::Quotation(q) => q.id.into_uuid(),
            Self::Receipt(r) => r.id.into_uuid(),
        }
    }

    /// Creator of a document; `None` for users.
    pub fn created_by(&self) -> Option<UserId> {
        match self {
            Self::User(_) => None,
            Self::Quotation(q) => q.created_by,
            Self::Receipt(r) => r.created_by,
        }
    }

    /// Human label for messages.
    pub fn label(&self) -> String {
        match self {
            Self::User(u) => u.label().to_string(),
            Self::Quotation(q) => format!("Quotation {}", q.number),
            Self::Receipt(r) => format!("Receipt {}", r.number),
        }
    }

    /// Link to the entity in the web client.
    pub fn action_url(&self) -> String {
        action_url(self.kind(), self.id())
    }

    /// Correlation key for notifications about this entity.
    pub fn group(&self) -> String {
        format!("{}_{}", self.kind(), self.id())
    }

    /// Metadata shared by every notification about this entity.
    pub fn metadata(&self) -> Value {
        let mut base = json!({
            "entity": self.kind(),
            "entity_id": self.id(),
        });
        let extra = match self {
            Self::User(u) => json!({"username": u.username, "role": u.role}),
            Self::Quotation(q) => json!({
                "number": q.number,
                "customer_name": q.customer_name,
                "status": q.status,
            }),
            Self::Receipt(r) => json!({
                "number": r.number,
                "customer_name": r.customer_name,
                "payment_status": r.payment_status,
                "amount": r.amount,
            }),
        };
        merge(&mut base, extra);
        base
    }
}

/// Link to an entity in the web client.
pub fn action_url(entity: EntityKind, id: Uuid) -> String {
    let collection = match entity {
        EntityKind::User => "users",
        EntityKind::Quotation => "quotations",
        EntityKind::Receipt => "receipts",
    };
    format!("/{collection}/{id}")
}

/// Shallow-merge the keys of `extra` into `base`.
pub fn merge(base: &mut Value, extra: Value) {
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_trigger_image_with_extra_columns() {
        let image = json!({
            "id": "0192f0c4-8a4e-7d3c-9b1a-1a2b3c4d5e6f",
            "username": "mover1",
            "email": null,
            "display_name": "Tran",
            "phone": null,
            "role": "staff",
            "status": "active",
            "password_hash": "ignored",
            "created_at": "2025-01-01T08:00:00.123456+00:00",
            "updated_at": "2025-01-01T08:00:00.123456+00:00"
        });
        let snapshot = Snapshot::decode(EntityKind::User, &image).unwrap();
        assert_eq!(snapshot.kind(), EntityKind::User);
        assert_eq!(snapshot.label(), "Tran");
        assert!(snapshot.action_url().starts_with("/users/"));
        assert_eq!(snapshot.metadata()["username"], "mover1");
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(Snapshot::decode(EntityKind::Receipt, &json!({"id": 1})).is_err());
    }
}
