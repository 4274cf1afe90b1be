use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

lazy_static! {
    // Deep link written by the server into `mobile_action`, e.g. `Book:{bookId:42}`
    static ref BOOK_ACTION_REGEX: Regex = Regex::new(r"^Book:\{bookId:(\d+)\}$").unwrap();
}

/// Where a notification wants the user to go when opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MobileAction {
    Book { book_id: i64 },
}

impl MobileAction {
    pub fn parse(raw: &str) -> Option<Self> {
        let captures = BOOK_ACTION_REGEX.captures(raw.trim())?;
        let book_id = captures.get(1)?.as_str().parse().ok()?;
        Some(MobileAction::Book { book_id })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub web_action: Option<String>,
    #[serde(default)]
    pub mobile_action: Option<String>,
    #[serde(default)]
    pub read_at: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// 0 = unread, 1 = read.
    pub is_read: u8,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Fields not interpreted here, such as the embedded `user`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.is_read == 1
    }

    /// The value a read/unread toggle sends for this item: 1 becomes 0 and
    /// anything else becomes 1.
    pub fn toggled_read(&self) -> u8 {
        if self.is_read == 1 {
            0
        } else {
            1
        }
    }

    pub fn action(&self) -> Option<MobileAction> {
        self.mobile_action.as_deref().and_then(MobileAction::parse)
    }
}

/// Body of the single-field read/unread PATCH.
#[derive(Debug, Serialize)]
pub struct ReadStatePatch {
    pub is_read: u8,
}
