//! Payload mapping for the hosted identity backend.
//!
//! The hosted backend reports users as `{id, email?, user_metadata}` where the
//! display name and avatar live in free-form metadata written by the OAuth
//! partner or by sign-up. An SDK wrapper implementing `AuthProvider` decodes
//! responses into these types and converts them into the session model.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{AccessToken, Session, User};

/// Metadata keys checked for the display name, in priority order.
const NAME_KEYS: [&str; 2] = ["full_name", "name"];

/// Metadata keys checked for the avatar URL, in priority order.
const AVATAR_KEYS: [&str; 2] = ["avatar_url", "picture"];

/// User record as returned by the hosted backend.
#[derive(Debug, Clone, Deserialize)]
pub struct HostedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl HostedUser {
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        HostedUser::deserialize(value)
    }

    fn metadata_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|k| self.user_metadata.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    }
}

impl From<HostedUser> for User {
    fn from(hosted: HostedUser) -> Self {
        let name = hosted.metadata_str(&NAME_KEYS);
        let avatar_url = hosted.metadata_str(&AVATAR_KEYS);
        User {
            email: hosted.email.unwrap_or_default(),
            id: hosted.id,
            name,
            avatar_url,
        }
    }
}

/// Session record as returned by the hosted backend.
#[derive(Debug, Clone, Deserialize)]
pub struct HostedSession {
    pub access_token: String,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<HostedUser>,
}

impl HostedSession {
    /// Split into the token-bearing `Session` and the user it belongs to.
    /// Sign-in and state-change responses carry both.
    pub fn into_parts(self) -> (Session, Option<User>) {
        let session = Session {
            access_token: AccessToken::new(self.access_token),
            expires_at: self
                .expires_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        };
        (session, map_user(self.user))
    }
}

impl From<HostedSession> for Session {
    fn from(hosted: HostedSession) -> Self {
        hosted.into_parts().0
    }
}

/// Map an optional backend user, as every provider response carries one.
pub fn map_user(user: Option<HostedUser>) -> Option<User> {
    user.map(User::from)
}
