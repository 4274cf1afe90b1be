//! Notification listing and read/unread handling.
//!
//! Read state is a *toggle*: [`NotificationFlow::set_read`] flips `is_read`
//! (1 -> 0, 0 -> 1) rather than setting a fixed value, so calling it twice on
//! the same item restores the original state.

use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use crate::api::ApiClient;
use crate::auth::AuthManager;
use crate::error::AppError;
use crate::models::notification::ReadStatePatch;
use crate::models::{Envelope, Notification};
use crate::query::{
    decode, Direction, FilterData, JoinOn, Latest, ListQuery, ListQueryFacade, Operator, SortData,
};

pub const NOTIFICATIONS_ROUTE: &str = "/notifications";
pub const MY_NOTIFICATIONS_ROUTE: &str = "/notifications/my";
const LIST_KEY: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    All,
    Read,
    #[default]
    Unread,
}

impl ReadFilter {
    // Sent verbatim as the `in` operand; the server parses the embedded list.
    fn operand(self) -> &'static str {
        match self {
            ReadFilter::All => "[0, 1]",
            ReadFilter::Read => "[1]",
            ReadFilter::Unread => "[0]",
        }
    }
}

/// What the notification list shows: a free-text search over title and
/// description, a read-state filter, and the page window.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationFilter {
    pub text: String,
    pub read: ReadFilter,
    pub page: u32,
    pub limit: u32,
}

impl Default for NotificationFilter {
    fn default() -> Self {
        Self {
            text: String::new(),
            read: ReadFilter::Unread,
            page: 1,
            limit: 10,
        }
    }
}

impl NotificationFilter {
    pub fn to_query(&self) -> ListQuery {
        ListQuery::new(MY_NOTIFICATIONS_ROUTE)
            .page(self.page)
            .limit(self.limit)
            .sort(vec![SortData::new("created_at", Direction::Desc)])
            .filter(vec![
                FilterData::new("title", self.text.as_str(), Operator::Like, JoinOn::Or),
                FilterData::new("description", self.text.as_str(), Operator::Like, JoinOn::Or),
                FilterData::new("is_read", self.read.operand(), Operator::In, JoinOn::And),
            ])
    }
}

/// Outcome of a read/unread toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadToggle {
    /// The PATCH response; `None` when no response was obtained.
    pub response: Option<Envelope<Value>>,
    /// The reloaded list, present after a successful toggle unless the
    /// reload failed or was overtaken by a newer list request.
    pub reloaded: Option<Envelope<Vec<Notification>>>,
}

impl ReadToggle {
    pub fn is_success(&self) -> bool {
        self.response.as_ref().map(|r| r.is_success()).unwrap_or(false)
    }
}

pub struct NotificationFlow {
    api: Arc<ApiClient>,
    auth: Arc<AuthManager>,
    queries: Arc<ListQueryFacade>,
}

impl NotificationFlow {
    pub fn new(api: Arc<ApiClient>, auth: Arc<AuthManager>, queries: Arc<ListQueryFacade>) -> Self {
        Self { api, auth, queries }
    }

    /// Loads a page of the user's notifications and, on success, resyncs the
    /// unread counter.
    pub async fn list(
        &self,
        filter: &NotificationFilter,
    ) -> Result<Latest<Option<Envelope<Vec<Notification>>>>, AppError> {
        let result = self.fetch(filter).await;
        if let Latest::Current(Some(envelope)) = &result {
            if envelope.is_success() {
                self.load_user_unread_notifications().await?;
            }
        }
        Ok(result)
    }

    /// Flips the item's read state on the server. On success the local item
    /// is updated, then the list reload and the unread-counter resync run
    /// concurrently as two independent requests.
    pub async fn set_read(
        &self,
        item: &mut Notification,
        reload: &NotificationFilter,
    ) -> Result<ReadToggle, AppError> {
        let target = item.toggled_read();
        let Some(response) = self.patch_read(item.id, target).await else {
            return Ok(ReadToggle {
                response: None,
                reloaded: None,
            });
        };
        if !response.is_success() {
            return Ok(ReadToggle {
                response: Some(response),
                reloaded: None,
            });
        }
        item.is_read = target;

        let (reloaded, unread) =
            futures::future::join(self.fetch(reload), self.load_user_unread_notifications()).await;
        unread?;

        Ok(ReadToggle {
            response: Some(response),
            reloaded: reloaded.current().flatten(),
        })
    }

    /// Fetches the profile and overwrites only the cached unread counter.
    /// Returns the new count, or `None` when the profile could not be fetched
    /// or the user signed out before it arrived.
    pub async fn load_user_unread_notifications(&self) -> Result<Option<u32>, AppError> {
        let envelope = match self.api.get("/profile").await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("unread counter resync failed: {}", e);
                return Ok(None);
            }
        };
        if !envelope.is_success() {
            warn!("unread counter resync rejected: {}", envelope.error_text());
            return Ok(None);
        }
        let count = envelope
            .data
            .as_ref()
            .and_then(|data| data.get("unread_notifications_count"))
            .and_then(Value::as_u64)
            .and_then(|count| u32::try_from(count).ok());
        let Some(count) = count else {
            warn!("profile response has no unread_notifications_count");
            return Ok(None);
        };
        if self.auth.update_unread_count(count).await?.is_none() {
            return Ok(None);
        }
        debug!("unread notifications: {}", count);
        Ok(Some(count))
    }

    /// Loads one notification. An unread notification is marked read as it is
    /// opened; an already-read one is left alone.
    pub async fn open(&self, id: i64) -> Result<Option<Envelope<Notification>>, AppError> {
        let Some(envelope) = self.queries.load(NOTIFICATIONS_ROUTE, id).await else {
            return Ok(None);
        };
        let Some(mut envelope) = decode::<Notification>(envelope) else {
            return Ok(None);
        };
        if let Some(item) = envelope.data.as_mut() {
            if !item.is_read() {
                if let Some(response) = self.patch_read(item.id, item.toggled_read()).await {
                    if response.is_success() {
                        item.is_read = item.toggled_read();
                        self.load_user_unread_notifications().await?;
                    }
                }
            }
        }
        Ok(Some(envelope))
    }

    /// Deletes one of the user's notifications. The server answers 204 on success.
    pub async fn delete(&self, id: i64) -> bool {
        match self
            .api
            .delete(&format!("{}/{}/my", NOTIFICATIONS_ROUTE, id))
            .await
        {
            Ok(status) => status == reqwest::StatusCode::NO_CONTENT,
            Err(e) => {
                warn!("deleting notification {} failed: {}", id, e);
                false
            }
        }
    }

    async fn fetch(
        &self,
        filter: &NotificationFilter,
    ) -> Latest<Option<Envelope<Vec<Notification>>>> {
        self.queries
            .query_latest(LIST_KEY, &filter.to_query())
            .await
            .typed()
    }

    async fn patch_read(&self, id: i64, is_read: u8) -> Option<Envelope<Value>> {
        let path = format!("{}/{}/read", NOTIFICATIONS_ROUTE, id);
        match self.api.patch_json(&path, &ReadStatePatch { is_read }).await {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!("updating read state of notification {} failed: {}", id, e);
                None
            }
        }
    }
}
