//! User directory: login lookup and actor display names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use oficina_auth::{Role, UserEvent, UserStatus};
use oficina_core::{Entity, UserId};
use oficina_events::EventEnvelope;

use super::{ProjectionError, StreamCursors};
use crate::aggregate_types;
use crate::read_model::ReadStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub status: UserStatus,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub must_change_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl Entity for UserRecord {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

#[derive(Debug)]
pub struct UsersProjection<S>
where
    S: ReadStore<UserId, UserRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> UsersProjection<S>
where
    S: ReadStore<UserId, UserRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, user_id: &UserId) -> Option<UserRecord> {
        self.store.get(user_id)
    }

    /// Users ordered by display name.
    pub fn list(&self) -> Vec<UserRecord> {
        let mut users = self.store.list();
        users.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
        users
    }

    pub fn by_email(&self, email: &str) -> Option<UserRecord> {
        let wanted = email.trim().to_lowercase();
        self.store.list().into_iter().find(|u| u.email == wanted)
    }

    pub fn display_name(&self, user_id: &UserId) -> Option<String> {
        self.store.get(user_id).map(|u| u.display_name)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::USER {
            return Ok(());
        }

        self.cursors.apply_once(envelope, || {
            let event: UserEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
            self.apply(event)
        })
    }

    fn apply(&self, event: UserEvent) -> Result<(), ProjectionError> {
        let (user_id, at) = match &event {
            UserEvent::Created(e) => {
                self.store.upsert(
                    e.user_id,
                    UserRecord {
                        id: e.user_id,
                        email: e.email.clone(),
                        display_name: e.display_name.clone(),
                        role: e.role.clone(),
                        status: UserStatus::Active,
                        password_hash: e.password_hash.clone(),
                        must_change_password: e.must_change_password,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
                return Ok(());
            }
            UserEvent::PasswordChanged(e) => (e.user_id, e.occurred_at),
            UserEvent::Suspended(e) => (e.user_id, e.occurred_at),
            UserEvent::Activated(e) => (e.user_id, e.occurred_at),
        };

        let mut record = self
            .store
            .get(&user_id)
            .ok_or_else(|| ProjectionError::MissingRecord(format!("user {user_id}")))?;

        match event {
            UserEvent::Created(_) => {}
            UserEvent::PasswordChanged(e) => {
                record.password_hash = e.password_hash;
                record.must_change_password = false;
            }
            UserEvent::Suspended(_) => record.status = UserStatus::Suspended,
            UserEvent::Activated(_) => record.status = UserStatus::Active,
        }
        record.updated_at = at;
        self.store.upsert(user_id, record);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();
        self.store.clear();
        for env in envelopes {
            self.apply_envelope(&env)?;
        }
        Ok(())
    }
}
