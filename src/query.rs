//! Generic list queries: pagination, sorting and filtering.
//!
//! The server expects `sort` and `filter` as JSON text embedded in flat query
//! parameters (`?sort=[{"property":"title","direction":"asc"}]`). That
//! encoding is part of the API contract and is reproduced exactly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ApiClient;
use crate::error::AppError;
use crate::models::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortData {
    pub property: String,
    pub direction: Direction,
}

impl SortData {
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinOn {
    And,
    Or,
}

/// Closed set of filter operators understood by the server. The client only
/// transports them; it never evaluates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "ilike")]
    ILike,
    #[serde(rename = "notlike")]
    NotLike,
    #[serde(rename = "notilike")]
    NotILike,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
    #[serde(rename = "between")]
    Between,
}

/// A filter value: a single string or a list of strings. `None` on the
/// owning `FilterData` is sent as JSON `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(value: Vec<String>) -> Self {
        FilterValue::List(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterData {
    pub property: String,
    pub value: Option<FilterValue>,
    pub any_match: bool,
    pub join_on: JoinOn,
    pub operator: Operator,
}

impl FilterData {
    pub fn new(
        property: impl Into<String>,
        value: impl Into<FilterValue>,
        operator: Operator,
        join_on: JoinOn,
    ) -> Self {
        Self {
            property: property.into(),
            value: Some(value.into()),
            any_match: true,
            join_on,
            operator,
        }
    }
}

/// A list request against one route. Absent fields send no parameter at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub route: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<Vec<SortData>>,
    pub filter: Option<Vec<FilterData>>,
    pub timezone: Option<String>,
}

impl ListQuery {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort(mut self, sort: Vec<SortData>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn filter(mut self, filter: Vec<FilterData>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Wire-level query parameters, in a stable order.
    pub fn to_params(&self) -> Result<Vec<(&'static str, String)>, AppError> {
        let mut params = Vec::new();
        // Zero means "not set", same as absent.
        if let Some(page) = self.page.filter(|page| *page > 0) {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit.filter(|limit| *limit > 0) {
            params.push(("limit", limit.to_string()));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort", serde_json::to_string(sort)?));
        }
        if let Some(filter) = &self.filter {
            params.push(("filter", serde_json::to_string(filter)?));
        }
        if let Some(timezone) = &self.timezone {
            params.push(("timezone", timezone.clone()));
        }
        Ok(params)
    }
}

/// Result of a query issued through [`ListQueryFacade::query_latest`].
#[derive(Debug, Clone, PartialEq)]
pub enum Latest<T> {
    /// No newer request for the same key was issued while this one was in flight.
    Current(T),
    /// A newer request for the same key was issued; this response is stale.
    Superseded,
}

impl<T> Latest<T> {
    pub fn current(self) -> Option<T> {
        match self {
            Latest::Current(value) => Some(value),
            Latest::Superseded => None,
        }
    }
}

impl Latest<Option<Envelope<Value>>> {
    /// Decodes the payload as `T`. An undecodable payload counts as a failed
    /// query (`Current(None)`).
    pub fn typed<T: DeserializeOwned>(self) -> Latest<Option<Envelope<T>>> {
        match self {
            Latest::Superseded => Latest::Superseded,
            Latest::Current(envelope) => Latest::Current(envelope.and_then(decode)),
        }
    }
}

/// Decodes an untyped envelope, logging and dropping it if the payload does not fit `T`.
pub fn decode<T: DeserializeOwned>(envelope: Envelope<Value>) -> Option<Envelope<T>> {
    match envelope.typed() {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!("response payload could not be read: {}", e);
            None
        }
    }
}

/// Per-key sequence numbers for discarding overtaken responses.
#[derive(Default)]
pub struct RequestSequencer {
    latest: Mutex<HashMap<String, u64>>,
}

impl RequestSequencer {
    pub fn issue(&self, key: &str) -> u64 {
        let mut latest = self.latest.lock();
        let seq = latest.entry(key.to_string()).or_insert(0);
        *seq += 1;
        *seq
    }

    pub fn is_latest(&self, key: &str, seq: u64) -> bool {
        self.latest.lock().get(key).copied() == Some(seq)
    }
}

/// Translates structured list requests into wire parameters and normalizes
/// every outcome into an envelope or `None`.
pub struct ListQueryFacade {
    api: Arc<ApiClient>,
    sequencer: RequestSequencer,
    in_flight: AtomicUsize,
}

impl ListQueryFacade {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            sequencer: RequestSequencer::default(),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// `None` means the query failed and no envelope is available; an
    /// envelope with `meta.success == false` means the server rejected it.
    pub async fn query(&self, query: &ListQuery) -> Option<Envelope<Value>> {
        let params = match query.to_params() {
            Ok(params) => params,
            Err(e) => {
                warn!("could not encode query for {}: {}", query.route, e);
                return None;
            }
        };
        debug!("query {} {:?}", query.route, params);
        self.track(self.api.get_with_params(&query.route, &params), &query.route)
            .await
    }

    /// Loads a single record at `route/id` with the same outcome contract as [`query`](Self::query).
    pub async fn load(&self, route: &str, id: i64) -> Option<Envelope<Value>> {
        let path = format!("{}/{}", route.trim_end_matches('/'), id);
        self.track(self.api.get(&path), &path).await
    }

    /// Like [`query`](Self::query), but reports the response as superseded
    /// when another request with the same `key` was issued after this one.
    pub async fn query_latest(
        &self,
        key: &str,
        query: &ListQuery,
    ) -> Latest<Option<Envelope<Value>>> {
        let seq = self.sequencer.issue(key);
        let result = self.query(query).await;
        if self.sequencer.is_latest(key, seq) {
            Latest::Current(result)
        } else {
            debug!("discarding superseded response for {} (#{})", key, seq);
            Latest::Superseded
        }
    }

    async fn track<F>(&self, request: F, label: &str) -> Option<Envelope<Value>>
    where
        F: std::future::Future<Output = Result<Envelope<Value>, AppError>>,
    {
        let result = {
            let _guard = InFlight::enter(&self.in_flight);
            request.await
        };
        match result {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!("request to {} failed: {}", label, e);
                None
            }
        }
    }
}

// Decrements on drop so a cancelled request does not leave the facade "loading".
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
