//! Receipt entity model.

use chrono::{DateTime, Utc};
use movehub_core::types::{QuotationId, ReceiptId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// A payment receipt issued for a moving job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Receipt {
    /// Unique receipt identifier.
    pub id: ReceiptId,
    /// Human-facing document number.
    pub number: String,
    /// Quotation the receipt was issued from.
    pub quotation_id: Option<QuotationId>,
    /// Paying customer.
    pub customer_name: String,
    /// Staff member who created it.
    pub created_by: Option<UserId>,
    /// Payment progress.
    pub payment_status: PaymentStatus,
    /// Payment due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Amount due.
    pub amount: f64,
    /// Payment method, when known.
    pub payment_method: Option<String>,
    /// When the receipt was created.
    pub created_at: DateTime<Utc>,
    /// When the receipt was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    /// An unpaid receipt past its due date.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.payment_status != PaymentStatus::Paid && self.due_date.is_some_and(|d| d < now)
    }
}

/// Payment progress of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Nothing paid yet.
    Pending,
    /// Partially paid.
    Partial,
    /// Fully paid.
    Paid,
    /// Marked overdue.
    Overdue,
}

impl PaymentStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
