//! Response DTOs.

use serde::{Deserialize, Serialize};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Count response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    /// The count.
    pub count: u64,
}

/// Bulk read-state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkedResponse {
    /// Notifications changed.
    pub marked: u64,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` when the process answers.
    pub status: String,
    /// Crate version.
    pub version: String,
}

/// Manual capture trigger outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    /// Notifications created.
    pub notifications_created: usize,
}

/// Job action outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobActionResponse {
    /// Job name.
    pub job: String,
    /// Counters of the run, for run requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<std::collections::BTreeMap<String, u64>>,
    /// Message.
    pub message: String,
}
