//! Shared test helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;

use movehub_api::{Stores, build_app, build_state};
use movehub_capture::CaptureBackend;
use movehub_core::config::AppConfig;
use movehub_core::types::{NotificationType, UserId};
use movehub_database::NotificationStore;
use movehub_database::memory::{MemoryDirectory, MemoryNotificationStore, MemorySettingsStore};
use movehub_entity::notification::{NewNotification, Notification};
use movehub_entity::user::{User, UserRole, UserStatus};

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Notification store for direct inspection
    pub notifications: Arc<MemoryNotificationStore>,
    /// Directory for seeding users
    pub directory: MemoryDirectory,
}

/// Identity sent in the gateway headers.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub id: UserId,
    pub role: UserRole,
}

/// Parsed test response
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    /// Create a new test application over in-memory stores
    pub async fn new() -> Self {
        let notifications = Arc::new(MemoryNotificationStore::new());
        let directory = MemoryDirectory::new();
        let stores = Stores {
            notifications: notifications.clone(),
            directory: Arc::new(directory.clone()),
            settings: Arc::new(MemorySettingsStore::new()),
            capture: CaptureBackend::Memory(directory.clone()),
        };

        let mut config = AppConfig::default();
        config.environment = "test".to_string();
        config.notifications.lifecycle.batch_pause_ms = 0;

        let state = build_state(config, stores)
            .await
            .expect("Failed to build state");

        Self {
            router: build_app(state),
            notifications,
            directory,
        }
    }

    /// Create a user and return the identity to call the API with
    pub async fn create_user(&self, username: &str, role: UserRole, status: UserStatus) -> Caller {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            email: Some(format!("{username}@test.com")),
            display_name: Some(username.to_string()),
            phone: Some("555-0100".to_string()),
            role,
            status,
            created_at: now,
            updated_at: now,
        };
        let caller = Caller {
            id: user.id,
            role,
        };
        self.directory
            .put_user(user)
            .await
            .expect("Failed to create test user");
        caller
    }

    /// Create an active admin
    pub async fn admin(&self) -> Caller {
        self.create_user("admin", UserRole::Admin, UserStatus::Active)
            .await
    }

    /// Create an active staff member
    pub async fn staff(&self, username: &str) -> Caller {
        self.create_user(username, UserRole::Staff, UserStatus::Active)
            .await
    }

    /// Insert a notification created `age_days` ago
    pub async fn seed_notification(
        &self,
        notification_type: NotificationType,
        recipients: Vec<UserId>,
        age_days: i64,
    ) -> Notification {
        let created_at = Utc::now() - Duration::days(age_days);
        let notification = Notification::create(
            NewNotification::new(notification_type, "Seeded", "Seeded message", recipients),
            created_at,
            90,
        )
        .expect("Failed to build notification");
        self.notifications
            .insert(&notification)
            .await
            .expect("Failed to insert notification");
        notification
    }

    /// Make an HTTP request to the test app
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        caller: Option<Caller>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(caller) = caller {
            req = req
                .header("x-user-id", caller.id.to_string())
                .header("x-user-role", caller.role.as_str());
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
