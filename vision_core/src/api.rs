//! JSON route layer over an entry store.
//!
//! [`dispatch`] answers the REST surface (`/api/setup`, `/api/entries`,
//! `/api/entries/{id}`) without binding to any HTTP server: it takes a method,
//! a request target and an optional body, and returns a status code with a
//! JSON body. [`RouteGateway`] goes the other way and implements
//! [`EntryStore`] by issuing requests through `dispatch` and decoding the
//! envelopes, so a session can be driven through the same contract a browser
//! client would use.

use crate::store::{EntryStore, StoreError, StoreResult};
use crate::types::format_timestamp;
use crate::{DemoUser, JournalEntry, NewEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// Status code plus JSON body
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn data(data: Value) -> Self {
        Self {
            status: 200,
            body: json!({ "data": data }),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }

    fn invalid_request(details: Vec<String>) -> Self {
        Self {
            status: 400,
            body: json!({ "error": "Invalid request data", "details": details }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `error` message of a failure body
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEntryBody {
    date: Option<String>,
    exercise: Option<String>,
    content: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteEntryBody {
    user_id: Option<String>,
}

/// Route one request to its handler
pub async fn dispatch<S: EntryStore + ?Sized>(
    store: &S,
    method: &str,
    target: &str,
    body: Option<&str>,
) -> ApiResponse {
    let method = method.to_ascii_uppercase();
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    tracing::debug!("{} {}", method, target);

    let response = match (method.as_str(), segments.as_slice()) {
        ("POST", ["api", "setup"]) => setup(store).await,
        ("GET", ["api", "entries"]) => list_entries(store, query_param(query, "userId")).await,
        ("POST", ["api", "entries"]) => create_entry(store, body).await,
        ("DELETE", ["api", "entries", id]) => delete_entry(store, id, body).await,
        (_, ["api", "setup"]) | (_, ["api", "entries"]) | (_, ["api", "entries", _]) => {
            ApiResponse::error(405, "Method not allowed")
        }
        _ => ApiResponse::error(404, "Not found"),
    };

    tracing::debug!("{} {} -> {}", method, path, response.status);
    response
}

async fn setup<S: EntryStore + ?Sized>(store: &S) -> ApiResponse {
    match store.ensure_demo_user().await {
        Ok(user) => ApiResponse::data(json!({
            "userId": user.user_id,
            "email": user.email,
            "name": user.name,
        })),
        Err(e) => {
            tracing::error!("Error creating temporary user: {:?}", e);
            ApiResponse::error(500, "Internal server error")
        }
    }
}

async fn list_entries<S: EntryStore + ?Sized>(store: &S, user_id: Option<&str>) -> ApiResponse {
    let user_id = match user_id {
        Some(id) if !id.is_empty() => id,
        _ => return ApiResponse::error(400, "User ID is required"),
    };
    let Some(user_id) = parse_id(user_id) else {
        return ApiResponse::error(400, "Invalid user ID format");
    };

    match store.list_entries(user_id).await {
        Ok(entries) => ApiResponse::data(entries_json(&entries)),
        Err(StoreError::InvalidInput(message)) => ApiResponse::error(400, &message),
        Err(StoreError::UserNotFound) => ApiResponse::error(404, "User not found"),
        Err(e) => {
            tracing::error!("Error fetching entries: {:?}", e);
            ApiResponse::error(500, "Internal server error")
        }
    }
}

async fn create_entry<S: EntryStore + ?Sized>(store: &S, body: Option<&str>) -> ApiResponse {
    let parsed: CreateEntryBody = match serde_json::from_str(body.unwrap_or("")) {
        Ok(parsed) => parsed,
        Err(e) => return ApiResponse::invalid_request(vec![format!("body: {}", e)]),
    };

    let mut issues = Vec::new();
    let date = match parsed.date.as_deref().map(DateTime::parse_from_rfc3339) {
        Some(Ok(date)) => Some(date.with_timezone(&Utc)),
        Some(Err(_)) => {
            issues.push("date: must be an ISO 8601 datetime".to_string());
            None
        }
        None => {
            issues.push("date: required".to_string());
            None
        }
    };
    let exercise = non_empty(parsed.exercise, "exercise", &mut issues);
    let content = non_empty(parsed.content, "content", &mut issues);
    let user_id = match parsed.user_id.as_deref().map(parse_id) {
        Some(Some(id)) => Some(id),
        Some(None) => {
            issues.push("userId: must be a UUID".to_string());
            None
        }
        None => {
            issues.push("userId: required".to_string());
            None
        }
    };

    let (Some(date), Some(exercise), Some(content), Some(user_id)) =
        (date, exercise, content, user_id)
    else {
        return ApiResponse::invalid_request(issues);
    };

    let request = NewEntry {
        date,
        exercise,
        content,
        user_id,
    };
    match store.create_entry(request).await {
        Ok(entry) => ApiResponse::data(entry_json(&entry)),
        Err(StoreError::InvalidInput(message)) => ApiResponse::invalid_request(vec![message]),
        Err(StoreError::UserNotFound) => ApiResponse::error(404, "User not found"),
        Err(e) => {
            tracing::error!("Error creating entry: {:?}", e);
            ApiResponse::error(500, "Internal server error")
        }
    }
}

async fn delete_entry<S: EntryStore + ?Sized>(
    store: &S,
    entry_id: &str,
    body: Option<&str>,
) -> ApiResponse {
    let parsed: DeleteEntryBody = serde_json::from_str(body.unwrap_or("")).unwrap_or_default();
    let ids = (parse_id(entry_id), parsed.user_id.as_deref().and_then(parse_id));
    let (Some(entry_id), Some(user_id)) = ids else {
        return ApiResponse::error(400, "Invalid ID format");
    };

    match store.delete_entry(entry_id, user_id).await {
        Ok(()) => ApiResponse {
            status: 200,
            body: json!({ "success": true }),
        },
        Err(StoreError::InvalidInput(_)) => ApiResponse::error(400, "Invalid ID format"),
        Err(StoreError::NotFoundOrUnauthorized) | Err(StoreError::UserNotFound) => {
            ApiResponse::error(404, "Entry not found or unauthorized")
        }
        Err(e) => {
            tracing::error!("Error deleting entry: {:?}", e);
            ApiResponse::error(500, "Failed to delete entry")
        }
    }
}

fn non_empty(value: Option<String>, field: &str, issues: &mut Vec<String>) -> Option<String> {
    match value {
        Some(v) if !v.is_empty() => Some(v),
        Some(_) => {
            issues.push(format!("{}: must not be empty", field));
            None
        }
        None => {
            issues.push(format!("{}: required", field));
            None
        }
    }
}

/// Only the hyphenated 8-4-4-4-12 form is an id on the wire
fn parse_id(text: &str) -> Option<Uuid> {
    if text.len() != 36 {
        return None;
    }
    Uuid::parse_str(text).ok()
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Entry JSON with timestamps in the canonical text form
fn entry_json(entry: &JournalEntry) -> Value {
    json!({
        "id": entry.id,
        "date": format_timestamp(&entry.date),
        "exercise": entry.exercise,
        "content": entry.content,
        "userId": entry.user_id,
        "createdAt": format_timestamp(&entry.created_at),
        "updatedAt": format_timestamp(&entry.updated_at),
    })
}

fn entries_json(entries: &[JournalEntry]) -> Value {
    Value::Array(entries.iter().map(entry_json).collect())
}

/// [`EntryStore`] that talks to another store through the route layer
pub struct RouteGateway<S> {
    store: S,
}

impl<S: EntryStore> RouteGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn request(&self, method: &str, target: &str, body: Option<Value>) -> ApiResponse {
        let body = body.map(|b| b.to_string());
        dispatch(&self.store, method, target, body.as_deref()).await
    }
}

/// Map a failure envelope back onto the error taxonomy
fn decode_error(response: &ApiResponse, not_found: StoreError) -> StoreError {
    let message = response.error_message().unwrap_or("request failed").to_string();
    match response.status {
        400 => StoreError::InvalidInput(message),
        404 => not_found,
        status => StoreError::internal("Route layer failure", format!("{} {}", status, message)),
    }
}

fn decode_data<T: DeserializeOwned>(response: ApiResponse) -> StoreResult<T> {
    let data = response.body.get("data").cloned().unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|e| StoreError::internal("Malformed response data", e))
}

#[async_trait]
impl<S: EntryStore> EntryStore for RouteGateway<S> {
    async fn ensure_demo_user(&self) -> StoreResult<DemoUser> {
        let response = self.request("POST", "/api/setup", None).await;
        if !response.is_success() {
            return Err(decode_error(&response, StoreError::UserNotFound));
        }
        decode_data(response)
    }

    async fn create_entry(&self, entry: NewEntry) -> StoreResult<JournalEntry> {
        let body = json!({
            "date": format_timestamp(&entry.date),
            "exercise": entry.exercise,
            "content": entry.content,
            "userId": entry.user_id,
        });
        let response = self.request("POST", "/api/entries", Some(body)).await;
        if !response.is_success() {
            return Err(decode_error(&response, StoreError::UserNotFound));
        }
        decode_data(response)
    }

    async fn list_entries(&self, user_id: Uuid) -> StoreResult<Vec<JournalEntry>> {
        let target = format!("/api/entries?userId={}", user_id);
        let response = self.request("GET", &target, None).await;
        if !response.is_success() {
            return Err(decode_error(&response, StoreError::UserNotFound));
        }
        decode_data(response)
    }

    async fn delete_entry(&self, entry_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        let target = format!("/api/entries/{}", entry_id);
        let body = json!({ "userId": user_id });
        let response = self.request("DELETE", &target, Some(body)).await;
        if !response.is_success() {
            return Err(decode_error(&response, StoreError::NotFoundOrUnauthorized));
        }
        Ok(())
    }
}
