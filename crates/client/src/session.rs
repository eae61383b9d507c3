use chrono::{DateTime, Utc};
use serde::Deserialize;

use oficina_core::UserId;

/// The logged-in user as the API describes it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,
    #[serde(rename = "nome")]
    pub display_name: String,
    #[serde(rename = "perfil")]
    pub role: String,
    #[serde(rename = "precisa_trocar_senha", default)]
    pub must_change_password: bool,
}

/// Bearer token plus the user it was issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    user: SessionUser,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: SessionUser, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            user,
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
