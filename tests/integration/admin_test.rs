//! Integration tests for admin notification management and job control.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use movehub_core::types::{LifecycleStatus, NotificationType};
use movehub_database::NotificationStore;
use movehub_entity::user::{UserRole, UserStatus};

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let app = helpers::TestApp::new().await;
    let staff = app.staff("alice").await;

    for (method, path) in [
        ("GET", "/api/admin/notifications/settings"),
        ("GET", "/api/admin/notifications/pending-review"),
        ("GET", "/api/admin/notifications/cleanup/preview"),
        ("GET", "/api/admin/jobs/status"),
        ("POST", "/api/admin/jobs/cleanup/run"),
    ] {
        let response = app.request(method, path, None, Some(staff)).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN, "{method} {path}");
    }
}

#[tokio::test]
async fn test_create_rejects_inactive_recipient() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;
    let active = app.staff("alice").await;
    let suspended = app
        .create_user("bob", UserRole::Staff, UserStatus::Suspended)
        .await;

    let response = app
        .request(
            "POST",
            "/api/admin/notifications",
            Some(json!({
                "recipient_ids": [active.id, suspended.id],
                "type": "custom",
                "title": "Hello",
                "message": "World",
            })),
            Some(admin),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(
        response.body["message"]
            .as_str()
            .is_some_and(|m| m.contains(&suspended.id.to_string()))
    );
    assert!(app.notifications.all().await.is_empty());
}

#[tokio::test]
async fn test_create_requires_recipients() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;

    let response = app
        .request(
            "POST",
            "/api/admin/notifications",
            Some(json!({
                "recipient_ids": [],
                "type": "custom",
                "title": "Hello",
                "message": "World",
            })),
            Some(admin),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_bulk_delete_requires_confirmation() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;
    let alice = app.staff("alice").await;
    let notification = app
        .seed_notification(NotificationType::DocumentCreated, vec![alice.id], 0)
        .await;

    let unconfirmed = app
        .request(
            "POST",
            "/api/admin/notifications/bulk-delete",
            Some(json!({ "ids": [notification.id] })),
            Some(admin),
        )
        .await;
    assert_eq!(unconfirmed.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.notifications.all().await.len(), 1);

    let confirmed = app
        .request(
            "POST",
            "/api/admin/notifications/bulk-delete",
            Some(json!({ "ids": [notification.id], "confirm": true })),
            Some(admin),
        )
        .await;
    assert_eq!(confirmed.status, StatusCode::OK);
    assert_eq!(confirmed.body["data"]["deleted"], 1);
    assert!(app.notifications.all().await.is_empty());
}

#[tokio::test]
async fn test_settings_round_trip_through_api() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;

    let current = app
        .request("GET", "/api/admin/notifications/settings", None, Some(admin))
        .await;
    assert_eq!(current.status, StatusCode::OK);
    assert_eq!(current.body["data"]["min_age_for_archiving_days"], 60);

    let updated = app
        .request(
            "PUT",
            "/api/admin/notifications/settings",
            Some(json!({
                "min_age_for_archiving_days": 30,
                "min_age_for_deletion_days": 120,
                "auto_delete_read_notifications": true,
            })),
            Some(admin),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"]["min_age_for_archiving_days"], 30);
    // Omitted fields fall back to their defaults.
    assert_eq!(updated.body["data"]["max_archive_size"], 10_000);

    let reread = app
        .request("GET", "/api/admin/notifications/settings", None, Some(admin))
        .await;
    assert_eq!(reread.body["data"]["auto_delete_read_notifications"], true);
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;

    let response = app
        .request(
            "PUT",
            "/api/admin/notifications/settings",
            Some(json!({
                "min_age_for_archiving_days": 90,
                "min_age_for_deletion_days": 30,
            })),
            Some(admin),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_day_counts_are_rejected() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;
    let alice = app.staff("alice").await;
    app.seed_notification(NotificationType::DocumentCreated, vec![alice.id], 0)
        .await;

    let settings = app
        .request(
            "PUT",
            "/api/admin/notifications/settings",
            Some(json!({
                "min_age_for_archiving_days": 200_000_000,
                "min_age_for_deletion_days": 200_000_000,
            })),
            Some(admin),
        )
        .await;
    assert_eq!(settings.status, StatusCode::BAD_REQUEST);

    // The rejected policy was not saved, so the preview still works.
    let preview = app
        .request(
            "GET",
            "/api/admin/notifications/cleanup/preview",
            None,
            Some(admin),
        )
        .await;
    assert_eq!(preview.status, StatusCode::OK);

    let bulk = app
        .request(
            "POST",
            "/api/admin/notifications/bulk-delete",
            Some(json!({
                "criteria": { "older_than_days": 1_000_000_000 },
                "confirm": true,
            })),
            Some(admin),
        )
        .await;
    assert_eq!(bulk.status, StatusCode::BAD_REQUEST);
    assert_eq!(bulk.body["error"], "VALIDATION_ERROR");
    assert_eq!(app.notifications.all().await.len(), 1);
}

#[tokio::test]
async fn test_cleanup_preview_counts_eligible_notifications() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;
    let alice = app.staff("alice").await;

    app.seed_notification(NotificationType::DocumentCreated, vec![alice.id], 61)
        .await;
    app.seed_notification(NotificationType::DocumentCreated, vec![alice.id], 5)
        .await;
    // Important types are preserved.
    app.seed_notification(NotificationType::SecurityAlert, vec![alice.id], 61)
        .await;

    let response = app
        .request(
            "GET",
            "/api/admin/notifications/cleanup/preview",
            None,
            Some(admin),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["archive_eligible"], 1);
    assert_eq!(response.body["data"]["archived_total"], 0);
    // Preview writes nothing.
    assert!(
        app.notifications
            .all()
            .await
            .iter()
            .all(|n| n.lifecycle_status == LifecycleStatus::Active)
    );
}

#[tokio::test]
async fn test_run_lifecycle_job_on_demand() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;
    let alice = app.staff("alice").await;
    let stale = app
        .seed_notification(NotificationType::DocumentCreated, vec![alice.id], 31)
        .await;

    let run = app
        .request("POST", "/api/admin/jobs/lifecycle/run", None, Some(admin))
        .await;
    assert_eq!(run.status, StatusCode::OK, "{:?}", run.body);
    assert_eq!(run.body["data"]["job"], "lifecycle");
    assert_eq!(run.body["data"]["counts"]["moved_to_review"], 1);
    assert_eq!(run.body["data"]["counts"]["reminders_sent"], 1);

    let stored = app
        .notifications
        .get(stale.id)
        .await
        .expect("store read")
        .expect("notification kept");
    assert_eq!(stored.lifecycle_status, LifecycleStatus::PendingReview);

    let pending = app
        .request(
            "GET",
            "/api/admin/notifications/pending-review",
            None,
            Some(admin),
        )
        .await;
    assert_eq!(pending.body["data"]["total_items"], 1);
    assert_eq!(pending.body["data"]["items"][0]["id"], stale.id.to_string());

    // The admin received the reminder.
    let inbox = app
        .request("GET", "/api/notifications", None, Some(admin))
        .await;
    assert_eq!(inbox.body["data"]["items"][0]["type"], "admin_reminder");
}

#[tokio::test]
async fn test_extend_moves_notification_out_of_review() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;
    let alice = app.staff("alice").await;
    let notification = app
        .seed_notification(NotificationType::DocumentCreated, vec![alice.id], 31)
        .await;
    app.request("POST", "/api/admin/jobs/lifecycle/run", None, Some(admin))
        .await;

    let extended = app
        .request(
            "POST",
            &format!("/api/admin/notifications/{}/extend", notification.id),
            Some(json!({ "days": 14 })),
            Some(admin),
        )
        .await;
    assert_eq!(extended.status, StatusCode::OK, "{:?}", extended.body);
    assert_eq!(extended.body["data"]["lifecycle_status"], "extended");

    let pending = app
        .request(
            "GET",
            "/api/admin/notifications/pending-review",
            None,
            Some(admin),
        )
        .await;
    assert_eq!(pending.body["data"]["total_items"], 0);

    let out_of_range = app
        .request(
            "POST",
            &format!("/api/admin/notifications/{}/extend", notification.id),
            Some(json!({ "days": 0 })),
            Some(admin),
        )
        .await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;

    let response = app
        .request("POST", "/api/admin/jobs/defragment/run", None, Some(admin))
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_restart_requires_running_scheduler() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;

    let response = app
        .request("POST", "/api/admin/jobs/cleanup/restart", None, Some(admin))
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_job_status_lists_every_job() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;

    let response = app
        .request("GET", "/api/admin/jobs/status", None, Some(admin))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["running"], false);
    let jobs = response.body["data"]["jobs"]
        .as_array()
        .expect("jobs array");
    assert_eq!(jobs.len(), 3);
}

#[tokio::test]
async fn test_system_health_reports_stopped_scheduler() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;

    let response = app
        .request(
            "GET",
            "/api/admin/notifications/system-health",
            None,
            Some(admin),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "warning");
    assert_eq!(response.body["data"]["scheduler_running"], false);
}

#[tokio::test]
async fn test_capture_trigger_replays_user_creation() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;
    let alice = app.staff("alice").await;

    let response = app
        .request(
            "POST",
            "/api/admin/capture/trigger",
            Some(json!({ "entity": "user", "id": alice.id })),
            Some(admin),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert!(response.body["data"]["notifications_created"].as_u64() >= Some(1));

    let inbox = app
        .request("GET", "/api/notifications?type=user_created", None, Some(admin))
        .await;
    assert_eq!(inbox.body["data"]["total_items"], 1);

    let missing = app
        .request(
            "POST",
            "/api/admin/capture/trigger",
            Some(json!({ "entity": "user", "id": uuid::Uuid::new_v4() })),
            Some(admin),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}
