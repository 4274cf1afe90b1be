use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Capability granting every mobile feature.
pub const ALL_ACTIONS: &str = "*";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub uf: String,
    pub country_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub cnpj: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub city_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<City>,
}

/// A user's role. `mobile_actions` is an unordered capability list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_actions: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Role {
    pub fn allows(&self, feature: &str) -> bool {
        self.mobile_actions
            .as_ref()
            .map(|actions| actions.iter().any(|a| a == ALL_ACTIONS || a == feature))
            .unwrap_or(false)
    }
}

/// The signed-in user's profile as returned by `/auth/login` and `/profile`.
///
/// Fields the client does not interpret are kept in `extra` so a profile
/// round-trips through local storage without losing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub avatar_thumbnail_url: Option<String>,
    #[serde(default)]
    pub fcm_token: Option<String>,
    /// Advisory badge counter, resynchronized from the server after read/unread changes.
    #[serde(default)]
    pub unread_notifications_count: u32,
    #[serde(default)]
    pub last_login_at: Option<String>,
    #[serde(default)]
    pub is_active: u8,
    #[serde(default)]
    pub is_verified: u8,
    #[serde(default)]
    pub role_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub library_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<Library>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl User {
    /// Whether the user's role grants the named mobile feature (e.g. `"Books"`).
    pub fn can_access(&self, feature: &str) -> bool {
        self.role.as_ref().map(|r| r.allows(feature)).unwrap_or(false)
    }

    pub fn has_unread_notifications(&self) -> bool {
        self.unread_notifications_count > 0
    }
}
