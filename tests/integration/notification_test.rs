//! Integration tests for the recipient notification endpoints.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use movehub_core::types::NotificationType;

#[tokio::test]
async fn test_requests_without_identity_are_rejected() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/notifications", None, None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_health_needs_no_identity() {
    let app = helpers::TestApp::new().await;

    let response = app.request("GET", "/api/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_recipient_read_flow() {
    let app = helpers::TestApp::new().await;
    let admin = app.admin().await;
    let alice = app.staff("alice").await;
    let bob = app.staff("bob").await;

    let created = app
        .request(
            "POST",
            "/api/admin/notifications",
            Some(json!({
                "recipient_ids": [alice.id, bob.id],
                "type": "custom",
                "title": "Truck maintenance",
                "message": "Truck 4 is out of service on Friday",
            })),
            Some(admin),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
    let id = created.body["data"]["id"]
        .as_str()
        .expect("notification id")
        .to_string();

    let count = app
        .request("GET", "/api/notifications/unread-count", None, Some(alice))
        .await;
    assert_eq!(count.status, StatusCode::OK);
    assert_eq!(count.body["data"]["count"], 1);

    let read = app
        .request("PUT", &format!("/api/notifications/{id}/read"), None, Some(alice))
        .await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body["data"]["changed"], true);

    let again = app
        .request("PUT", &format!("/api/notifications/{id}/read"), None, Some(alice))
        .await;
    assert_eq!(again.body["data"]["changed"], false);

    let count = app
        .request("GET", "/api/notifications/unread-count", None, Some(alice))
        .await;
    assert_eq!(count.body["data"]["count"], 0);

    // Bob's read state is independent of Alice's.
    let bob_count = app
        .request("GET", "/api/notifications/unread-count", None, Some(bob))
        .await;
    assert_eq!(bob_count.body["data"]["count"], 1);

    let unread = app
        .request("PUT", &format!("/api/notifications/{id}/unread"), None, Some(alice))
        .await;
    assert_eq!(unread.status, StatusCode::OK);
    assert_eq!(unread.body["data"]["is_read"], false);
    assert_eq!(unread.body["data"]["changed"], true);
}

#[tokio::test]
async fn test_list_filters_by_read_state() {
    let app = helpers::TestApp::new().await;
    let alice = app.staff("alice").await;

    let first = app
        .seed_notification(NotificationType::DocumentCreated, vec![alice.id], 2)
        .await;
    app.seed_notification(NotificationType::PaymentReceived, vec![alice.id], 1)
        .await;

    app.request(
        "PUT",
        &format!("/api/notifications/{}/read", first.id),
        None,
        Some(alice),
    )
    .await;

    let all = app
        .request("GET", "/api/notifications", None, Some(alice))
        .await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body["data"]["total_items"], 2);
    // Newest first.
    assert_eq!(all.body["data"]["items"][0]["type"], "payment_received");

    let unread = app
        .request("GET", "/api/notifications?read=false", None, Some(alice))
        .await;
    assert_eq!(unread.body["data"]["total_items"], 1);
    assert_eq!(unread.body["data"]["items"][0]["is_read"], false);

    let by_type = app
        .request(
            "GET",
            "/api/notifications?type=document_created",
            None,
            Some(alice),
        )
        .await;
    assert_eq!(by_type.body["data"]["total_items"], 1);
    assert_eq!(by_type.body["data"]["items"][0]["is_read"], true);
}

#[tokio::test]
async fn test_mark_all_read() {
    let app = helpers::TestApp::new().await;
    let alice = app.staff("alice").await;

    for _ in 0..3 {
        app.seed_notification(NotificationType::DocumentUpdated, vec![alice.id], 0)
            .await;
    }

    let marked = app
        .request("PUT", "/api/notifications/read-all", None, Some(alice))
        .await;
    assert_eq!(marked.status, StatusCode::OK);
    assert_eq!(marked.body["data"]["marked"], 3);

    let count = app
        .request("GET", "/api/notifications/unread-count", None, Some(alice))
        .await;
    assert_eq!(count.body["data"]["count"], 0);
}

#[tokio::test]
async fn test_other_users_notifications_are_not_found() {
    let app = helpers::TestApp::new().await;
    let alice = app.staff("alice").await;
    let mallory = app.staff("mallory").await;

    let notification = app
        .seed_notification(NotificationType::DocumentCreated, vec![alice.id], 0)
        .await;

    let response = app
        .request(
            "PUT",
            &format!("/api/notifications/{}/read", notification.id),
            None,
            Some(mallory),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
