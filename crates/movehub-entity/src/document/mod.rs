//! Business documents watched by the capture adapter.

pub mod quotation;
pub mod receipt;

pub use quotation::{Quotation, QuotationStatus};
pub use receipt::{PaymentStatus, Receipt};
