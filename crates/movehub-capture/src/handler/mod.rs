//! Change event handling: classify an event and fan out notifications.

pub mod classify;
pub mod snapshot;

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use movehub_core::error::AppError;
use movehub_core::events::{ChangeEvent, ChangeOperation, EntityKind};
use movehub_core::result::AppResult;
use movehub_core::types::{NotificationType, UserId};
use movehub_database::DirectoryStore;
use movehub_entity::notification::NewNotification;
use movehub_service::{NotificationDispatcher, NotificationRules};

use classify::{UpdateKind, classify_update};
use snapshot::{Snapshot, action_url, merge};

/// Converts change events into notifications.
#[derive(Clone)]
pub struct ChangeHandler {
    directory: Arc<dyn DirectoryStore>,
    rules: NotificationRules,
    dispatcher: NotificationDispatcher,
}

impl std::fmt::Debug for ChangeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeHandler").finish_non_exhaustive()
    }
}

impl ChangeHandler {
    /// Creates a new change handler.
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        rules: NotificationRules,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            directory,
            rules,
            dispatcher,
        }
    }

    /// Handle one event, returning how many notifications were created.
    pub async fn handle(&self, event: &ChangeEvent) -> AppResult<usize> {
        match event.operation {
            ChangeOperation::Insert => match self.current(event).await? {
                Some(snapshot) => self.on_created(&snapshot).await,
                None => {
                    debug!(entity = %event.entity, id = %event.id, "Inserted row already gone");
                    Ok(0)
                }
            },
            ChangeOperation::Update => self.on_updated(event).await,
            ChangeOperation::Delete => self.on_deleted(event).await,
            ChangeOperation::Lapsed => match self.current(event).await? {
                Some(snapshot) => self.on_lapsed(&snapshot).await,
                None => Ok(0),
            },
        }
    }

    /// Re-read an entity and run the creation fan-out for it.
    ///
    /// Used by the manual trigger; may duplicate a fan-out that the feed
    /// or poller also performs.
    pub async fn replay_created(&self, entity: EntityKind, id: Uuid) -> AppResult<usize> {
        let snapshot = Snapshot::load(self.directory.as_ref(), entity, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{entity} {id} not found")))?;
        self.on_created(&snapshot).await
    }

    /// The row after the event: the payload image when it decodes, the
    /// stored row otherwise.
    async fn current(&self, event: &ChangeEvent) -> AppResult<Option<Snapshot>> {
        if let Some(image) = &event.after {
            match Snapshot::decode(event.entity, image) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(e) => debug!(
                    entity = %event.entity,
                    id = %event.id,
                    error = %e,
                    "Row image undecodable; re-reading"
                ),
            }
        }
        Snapshot::load(self.directory.as_ref(), event.entity, event.id).await
    }

    async fn on_created(&self, snapshot: &Snapshot) -> AppResult<usize> {
        match snapshot {
            Snapshot::User(user) => {
                let admins = self.rules.admins().await?;
                let mut created = self
                    .send(
                        NewNotification::new(
                            NotificationType::UserCreated,
                            "New user registered",
                            format!("{} joined as {}", user.label(), user.role),
                            admins,
                        )
                        .with_action(snapshot.action_url(), "View user")
                        .with_metadata(snapshot.metadata()),
                    )
                    .await?;

                let missing = user.missing_profile_fields();
                if !missing.is_empty() {
                    let mut metadata = snapshot.metadata();
                    merge(&mut metadata, json!({ "missing_fields": missing }));
                    created += self
                        .send(
                            NewNotification::new(
                                NotificationType::ProfileIncomplete,
                                "Complete your profile",
                                format!("Please add your {}", missing.join(", ")),
                                vec![user.id],
                            )
                            .with_action(snapshot.action_url(), "Edit profile")
                            .with_metadata(metadata),
                        )
                        .await?;
                }
                Ok(created)
            }
            Snapshot::Quotation(_) | Snapshot::Receipt(_) => {
                let recipients = self.rules.stakeholders(snapshot.created_by()).await?;
                let label = snapshot.label();
                self.send(
                    NewNotification::new(
                        NotificationType::DocumentCreated,
                        format!("{label} created"),
                        format!("{label} was created"),
                        recipients,
                    )
                    .with_actor(snapshot.created_by())
                    .with_action(snapshot.action_url(), "Open")
                    .with_group(snapshot.group())
                    .with_metadata(snapshot.metadata()),
                )
                .await
            }
        }
    }

    async fn on_updated(&self, event: &ChangeEvent) -> AppResult<usize> {
        let Some(before) = event
            .before
            .as_ref()
            .and_then(|image| Snapshot::decode(event.entity, image).ok())
        else {
            warn!(
                entity = %event.entity,
                id = %event.id,
                "Update without a usable prior row image; skipped"
            );
            return Ok(0);
        };
        let Some(after) = self.current(event).await? else {
            debug!(entity = %event.entity, id = %event.id, "Updated row already gone");
            return Ok(0);
        };

        let label = after.label();
        let draft = match classify_update(&before, &after)? {
            UpdateKind::Unchanged => {
                debug!(entity = %event.entity, id = %event.id, "No labelled field changed");
                return Ok(0);
            }
            UpdateKind::UserSuspended => NewNotification::new(
                NotificationType::UserSuspended,
                "Account suspended",
                format!("{label}'s account was suspended"),
                self.rules.stakeholders(Some(UserId::from_uuid(event.id))).await?,
            ),
            UpdateKind::UserActivated => NewNotification::new(
                NotificationType::UserActivated,
                "Account activated",
                format!("{label}'s account is active"),
                self.rules.stakeholders(Some(UserId::from_uuid(event.id))).await?,
            ),
            UpdateKind::UserRoleChanged { from, to } => {
                let mut metadata = after.metadata();
                merge(&mut metadata, json!({ "previous_role": from, "new_role": to }));
                NewNotification::new(
                    NotificationType::UserRoleChanged,
                    "Role changed",
                    format!("{label}'s role changed from {from} to {to}"),
                    self.rules.stakeholders(Some(UserId::from_uuid(event.id))).await?,
                )
                .with_metadata(metadata)
            }
            UpdateKind::PaymentReceived => NewNotification::new(
                NotificationType::PaymentReceived,
                "Payment received",
                format!("{label} has been paid in full"),
                self.rules.stakeholders(after.created_by()).await?,
            ),
            UpdateKind::QuotationConverted => NewNotification::new(
                NotificationType::QuotationConverted,
                "Quotation converted",
                format!("{label} was converted into a moving job"),
                self.rules.stakeholders(after.created_by()).await?,
            ),
            UpdateKind::QuotationExpired => {
                return self.on_lapsed(&after).await;
            }
            UpdateKind::PaymentOverdue => {
                return self.on_lapsed(&after).await;
            }
            UpdateKind::Generic(changes) => {
                let notification_type = if event.entity.is_document() {
                    NotificationType::DocumentUpdated
                } else {
                    NotificationType::UserUpdated
                };
                let fields: Vec<&str> = changes.iter().map(|c| c.label.as_str()).collect();
                let message = format!("{label} changed: {}", fields.join(", "));
                let mut metadata = after.metadata();
                merge(&mut metadata, json!({ "changes": changes }));
                NewNotification::new(
                    notification_type,
                    format!("{label} updated"),
                    message,
                    self.rules.admins().await?,
                )
                .with_metadata(metadata)
            }
        };

        let draft = if draft.metadata.as_object().is_some_and(|m| m.is_empty()) {
            draft.with_metadata(after.metadata())
        } else {
            draft
        };
        let draft = if event.entity.is_document() {
            draft.with_group(after.group())
        } else {
            draft
        };
        self.send(draft.with_action(after.action_url(), "Open")).await
    }

    async fn on_deleted(&self, event: &ChangeEvent) -> AppResult<usize> {
        let label = event
            .before
            .as_ref()
            .and_then(|image| Snapshot::decode(event.entity, image).ok())
            .map(|s| s.label())
            .unwrap_or_else(|| format!("{} {}", event.entity, event.id));
        let metadata = json!({
            "entity": event.entity,
            "entity_id": event.id,
            "deleted": true,
        });

        let draft = match event.entity {
            EntityKind::User => NewNotification::new(
                NotificationType::UserDeleted,
                "User removed",
                format!("{label} was removed"),
                self.rules.all_active_users().await?,
            ),
            EntityKind::Quotation | EntityKind::Receipt => NewNotification::new(
                NotificationType::DocumentDeleted,
                format!("{label} deleted"),
                format!("{label} was deleted"),
                self.rules.admins().await?,
            )
            .with_group(format!("{}_{}", event.entity, event.id)),
        };
        self.send(draft.with_metadata(metadata)).await
    }

    async fn on_lapsed(&self, snapshot: &Snapshot) -> AppResult<usize> {
        let label = snapshot.label();
        let (notification_type, title, message) = match snapshot {
            Snapshot::Quotation(_) => (
                NotificationType::QuotationExpired,
                "Quotation expired",
                format!("{label} is past its validity date"),
            ),
            Snapshot::Receipt(_) => (
                NotificationType::PaymentOverdue,
                "Payment overdue",
                format!("{label} is past its due date"),
            ),
            Snapshot::User(_) => return Ok(0),
        };
        let recipients = self.rules.stakeholders(snapshot.created_by()).await?;
        self.send(
            NewNotification::new(notification_type, title, message, recipients)
                .with_action(action_url(snapshot.kind(), snapshot.id()), "Open")
                .with_group(snapshot.group())
                .with_metadata(snapshot.metadata()),
        )
        .await
    }

    async fn send(&self, draft: NewNotification) -> AppResult<usize> {
        Ok(usize::from(self.dispatcher.dispatch(draft).await?.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use movehub_core::types::QuotationId;
    use movehub_database::memory::{MemoryDirectory, MemoryNotificationStore};
    use movehub_entity::document::{Quotation, QuotationStatus};
    use movehub_entity::notification::Notification;
    use movehub_entity::user::{User, UserRole, UserStatus};

    struct Fixture {
        handler: ChangeHandler,
        directory: Arc<MemoryDirectory>,
        store: Arc<MemoryNotificationStore>,
        admin: UserId,
    }

    fn user(role: UserRole) -> User {
        User {
            id: UserId::new(),
            username: format!("{role}-{}", UserId::new()),
            email: Some("x@example.com".into()),
            display_name: Some("Someone".into()),
            phone: Some("0900".into()),
            role,
            status: UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn quotation(created_by: Option<UserId>) -> Quotation {
        Quotation {
            id: QuotationId::new(),
            number: "Q-100".into(),
            customer_name: "Ng".into(),
            created_by,
            status: QuotationStatus::Sent,
            valid_until: None,
            total_amount: 900.0,
            origin_address: None,
            destination_address: None,
            moving_date: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn fixture() -> Fixture {
        let directory = Arc::new(MemoryDirectory::new());
        let store = Arc::new(MemoryNotificationStore::new());
        let admin = user(UserRole::Admin);
        directory.put_user(admin.clone()).await.unwrap();
        let handler = ChangeHandler::new(
            directory.clone(),
            NotificationRules::new(directory.clone()),
            NotificationDispatcher::new(store.clone(), 30),
        );
        Fixture {
            handler,
            directory,
            store,
            admin: admin.id,
        }
    }

    async fn of_type(store: &MemoryNotificationStore, t: NotificationType) -> Vec<Notification> {
        store
            .all()
            .await
            .into_iter()
            .filter(|n| n.notification_type == t)
            .collect()
    }

    #[tokio::test]
    async fn test_user_insert_with_incomplete_profile() {
        let f = fixture().await;
        let mut new_user = user(UserRole::Customer);
        new_user.phone = None;
        let image = serde_json::to_value(&new_user).unwrap();

        let created = f
            .handler
            .handle(&ChangeEvent::insert(EntityKind::User, new_user.id.into_uuid(), image))
            .await
            .unwrap();
        assert_eq!(created, 2);

        let welcome = of_type(&f.store, NotificationType::UserCreated).await;
        assert_eq!(welcome[0].recipient_ids, vec![f.admin]);
        let profile = of_type(&f.store, NotificationType::ProfileIncomplete).await;
        assert_eq!(profile[0].recipient_ids, vec![new_user.id]);
        assert_eq!(profile[0].metadata["missing_fields"][0], "phone");
    }

    #[tokio::test]
    async fn test_document_insert_reaches_creator_and_admins_once() {
        let f = fixture().await;
        let creator = user(UserRole::Staff);
        f.directory.put_user(creator.clone()).await.unwrap();
        let q = quotation(Some(creator.id));
        let image = serde_json::to_value(&q).unwrap();

        f.handler
            .handle(&ChangeEvent::insert(EntityKind::Quotation, q.id.into_uuid(), image))
            .await
            .unwrap();

        let created = of_type(&f.store, NotificationType::DocumentCreated).await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].recipient_ids, vec![creator.id, f.admin]);
        assert_eq!(created[0].actor_id, Some(creator.id));
    }

    #[tokio::test]
    async fn test_admin_creating_document_is_not_duplicated() {
        let f = fixture().await;
        let q = quotation(Some(f.admin));
        f.handler
            .handle(&ChangeEvent::insert(
                EntityKind::Quotation,
                q.id.into_uuid(),
                serde_json::to_value(&q).unwrap(),
            ))
            .await
            .unwrap();
        let created = of_type(&f.store, NotificationType::DocumentCreated).await;
        assert_eq!(created[0].recipient_ids, vec![f.admin]);
    }

    #[tokio::test]
    async fn test_update_fires_exactly_one_path() {
        let f = fixture().await;
        let q = quotation(None);
        let mut converted = q.clone();
        converted.status = QuotationStatus::Converted;
        converted.notes = Some("crew booked".into());

        let created = f
            .handler
            .handle(&ChangeEvent::update(
                EntityKind::Quotation,
                q.id.into_uuid(),
                serde_json::to_value(&q).unwrap(),
                serde_json::to_value(&converted).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(created, 1);
        let all = f.store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].notification_type, NotificationType::QuotationConverted);
    }

    #[tokio::test]
    async fn test_generic_update_goes_to_admins_with_changes() {
        let f = fixture().await;
        let creator = user(UserRole::Staff);
        f.directory.put_user(creator.clone()).await.unwrap();
        let q = quotation(Some(creator.id));
        let mut edited = q.clone();
        edited.notes = Some("piano".into());

        f.handler
            .handle(&ChangeEvent::update(
                EntityKind::Quotation,
                q.id.into_uuid(),
                serde_json::to_value(&q).unwrap(),
                serde_json::to_value(&edited).unwrap(),
            ))
            .await
            .unwrap();

        let updated = of_type(&f.store, NotificationType::DocumentUpdated).await;
        assert_eq!(updated[0].recipient_ids, vec![f.admin]);
        assert_eq!(updated[0].metadata["changes"][0]["label"], "Notes");
        assert_eq!(updated[0].metadata["changes"][0]["value"], "piano");
    }

    #[tokio::test]
    async fn test_update_with_stripped_after_image_rereads_row() {
        let f = fixture().await;
        let mut staff = user(UserRole::Staff);
        let before = serde_json::to_value(&staff).unwrap();
        staff.status = UserStatus::Suspended;
        f.directory.put_user(staff.clone()).await.unwrap();

        let mut event = ChangeEvent::update(
            EntityKind::User,
            staff.id.into_uuid(),
            before,
            serde_json::Value::Null,
        );
        event.after = None;
        f.handler.handle(&event).await.unwrap();

        let suspended = of_type(&f.store, NotificationType::UserSuspended).await;
        assert_eq!(suspended[0].recipient_ids, vec![staff.id, f.admin]);
    }

    #[tokio::test]
    async fn test_user_delete_notifies_all_active_users() {
        let f = fixture().await;
        let staff = user(UserRole::Staff);
        f.directory.put_user(staff.clone()).await.unwrap();
        let gone = UserId::new();

        f.handler
            .handle(&ChangeEvent::delete(EntityKind::User, gone.into_uuid()))
            .await
            .unwrap();
        let deleted = of_type(&f.store, NotificationType::UserDeleted).await;
        assert_eq!(deleted[0].recipient_ids.len(), 2);
        assert_eq!(deleted[0].metadata["entity_id"], gone.to_string());
    }

    #[tokio::test]
    async fn test_replay_missing_entity_is_not_found() {
        let f = fixture().await;
        let err = f
            .handler
            .replay_created(EntityKind::Receipt, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind, movehub_core::error::ErrorKind::NotFound);
    }
}
