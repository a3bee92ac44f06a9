//! Update classification.
//!
//! Exactly one outcome per update. Specific transitions are checked in
//! order and the first match wins; otherwise the labelled-field diff
//! decides between a generic update and nothing.

use movehub_entity::document::{PaymentStatus, QuotationStatus};
use movehub_entity::schema::{EntitySchema, FieldChange};
use movehub_entity::user::{UserRole, UserStatus};

use movehub_core::result::AppResult;

use super::snapshot::Snapshot;

/// What an update means for notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    /// User status moved to suspended.
    UserSuspended,
    /// User status moved to active.
    UserActivated,
    /// User role changed.
    UserRoleChanged {
        /// Previous role.
        from: UserRole,
        /// New role.
        to: UserRole,
    },
    /// Receipt payment status moved to paid.
    PaymentReceived,
    /// Quotation status moved to converted.
    QuotationConverted,
    /// Quotation status moved to expired.
    QuotationExpired,
    /// Receipt payment status moved to overdue.
    PaymentOverdue,
    /// Labelled fields changed.
    Generic(Vec<FieldChange>),
    /// No labelled field changed.
    Unchanged,
}

/// Classify an update from its two row images.
pub fn classify_update(before: &Snapshot, after: &Snapshot) -> AppResult<UpdateKind> {
    let specific = match (before, after) {
        (Snapshot::User(old), Snapshot::User(new)) => {
            if old.status != new.status && new.status == UserStatus::Suspended {
                Some(UpdateKind::UserSuspended)
            } else if old.status != new.status && new.status == UserStatus::Active {
                Some(UpdateKind::UserActivated)
            } else if old.role != new.role {
                Some(UpdateKind::UserRoleChanged {
                    from: old.role,
                    to: new.role,
                })
            } else {
                None
            }
        }
        (Snapshot::Receipt(old), Snapshot::Receipt(new)) => {
            if old.payment_status == new.payment_status {
                None
            } else if new.payment_status == PaymentStatus::Paid {
                Some(UpdateKind::PaymentReceived)
            } else if new.payment_status == PaymentStatus::Overdue {
                Some(UpdateKind::PaymentOverdue)
            } else {
                None
            }
        }
        (Snapshot::Quotation(old), Snapshot::Quotation(new)) => {
            if old.status == new.status {
                None
            } else if new.status == QuotationStatus::Converted {
                Some(UpdateKind::QuotationConverted)
            } else if new.status == QuotationStatus::Expired {
                Some(UpdateKind::QuotationExpired)
            } else {
                None
            }
        }
        _ => None,
    };
    if let Some(kind) = specific {
        return Ok(kind);
    }

    // Both images go through the same serializer so formatting differences
    // between the trigger payload and a re-read row never show up as changes.
    let schema = EntitySchema::for_entity(after.kind());
    let changes = schema.diff(&before.to_image()?, &after.to_image()?);
    Ok(if changes.is_empty() {
        UpdateKind::Unchanged
    } else {
        UpdateKind::Generic(changes)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use movehub_core::types::{ReceiptId, UserId};
    use movehub_entity::document::Receipt;
    use movehub_entity::user::User;

    fn user() -> User {
        User {
            id: UserId::new(),
            username: "crew7".into(),
            email: Some("c@example.com".into()),
            display_name: None,
            phone: None,
            role: UserRole::Staff,
            status: UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn receipt() -> Receipt {
        Receipt {
            id: ReceiptId::new(),
            number: "R-9".into(),
            quotation_id: None,
            customer_name: "Ng".into(),
            created_by: None,
            payment_status: PaymentStatus::Pending,
            due_date: None,
            amount: 450.0,
            payment_method: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_suspension_wins_over_role_change() {
        let old = user();
        let mut new = old.clone();
        new.status = UserStatus::Suspended;
        new.role = UserRole::Manager;
        let kind = classify_update(&Snapshot::User(old), &Snapshot::User(new)).unwrap();
        assert_eq!(kind, UpdateKind::UserSuspended);
    }

    #[test]
    fn test_role_change() {
        let old = user();
        let mut new = old.clone();
        new.role = UserRole::Admin;
        let kind = classify_update(&Snapshot::User(old), &Snapshot::User(new)).unwrap();
        assert_eq!(
            kind,
            UpdateKind::UserRoleChanged {
                from: UserRole::Staff,
                to: UserRole::Admin
            }
        );
    }

    #[test]
    fn test_payment_received() {
        let old = receipt();
        let mut new = old.clone();
        new.payment_status = PaymentStatus::Paid;
        new.payment_method = Some("transfer".into());
        let kind = classify_update(&Snapshot::Receipt(old), &Snapshot::Receipt(new)).unwrap();
        assert_eq!(kind, UpdateKind::PaymentReceived);
    }

    #[test]
    fn test_generic_diff_lists_labelled_fields() {
        let old = receipt();
        let mut new = old.clone();
        new.payment_status = PaymentStatus::Partial;
        new.amount = 500.0;
        let kind = classify_update(&Snapshot::Receipt(old), &Snapshot::Receipt(new)).unwrap();
        let UpdateKind::Generic(changes) = kind else {
            panic!("expected generic update, got {kind:?}");
        };
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["payment_status", "amount"]);
    }

    #[test]
    fn test_timestamp_only_update_is_unchanged() {
        let old = user();
        let mut new = old.clone();
        new.updated_at = Utc::now() + chrono::Duration::seconds(5);
        let kind = classify_update(&Snapshot::User(old), &Snapshot::User(new)).unwrap();
        assert_eq!(kind, UpdateKind::Unchanged);
    }
}
