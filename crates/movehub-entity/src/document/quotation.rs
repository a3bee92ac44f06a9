//! Quotation entity model.

use chrono::{DateTime, Utc};
use movehub_core::types::{QuotationId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// A price quotation sent to a customer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quotation {
    /// Unique quotation identifier.
    pub id: QuotationId,
    /// Human-facing document number.
    pub number: String,
    /// Customer the quotation is addressed to.
    pub customer_name: String,
    /// Staff member who created it.
    pub created_by: Option<UserId>,
    /// Workflow status.
    pub status: QuotationStatus,
    /// Date after which the offer lapses.
    pub valid_until: Option<DateTime<Utc>>,
    /// Quoted total.
    pub total_amount: f64,
    /// Pickup address.
    pub origin_address: Option<String>,
    /// Delivery address.
    pub destination_address: Option<String>,
    /// Planned moving date.
    pub moving_date: Option<DateTime<Utc>>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// When the quotation was created.
    pub created_at: DateTime<Utc>,
    /// When the quotation was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    /// A sent quotation whose validity date has passed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == QuotationStatus::Sent && self.valid_until.is_some_and(|v| v < now)
    }
}

/// Workflow status of a quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "quotation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    /// Being edited.
    Draft,
    /// Sent to the customer.
    Sent,
    /// Accepted by the customer.
    Accepted,
    /// Rejected by the customer.
    Rejected,
    /// Converted into a moving job.
    Converted,
    /// Lapsed.
    Expired,
}

impl QuotationStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Converted => "converted",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
