//! Cookie-keyed server-side sessions.
//!
//! The browser only ever holds an opaque session id in an HttpOnly cookie. Everything else
//! (workflow state, flash messages) lives in a [`SessionStore`] keyed by that id.
//!
//! [`session_middleware`] runs on every request: it resolves the cookie to a live session or
//! starts a new one, puts a [`Session`] handle into the request extensions and sets the cookie on
//! the response when the session is new. Handlers take the handle as an extractor.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, HeaderValue, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use moka::future::Cache;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{AppState, config::SessionConfig, errors::Error};

/// Session key holding informational flash messages
pub const FLASH_KEY: &str = "flash";
/// Session key holding error flash messages
pub const ERROR_KEY: &str = "error";

/// Storage for per-session key/value data.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start an empty session and return its id
    async fn create(&self) -> Uuid;

    /// Whether the session exists and has not expired
    async fn exists(&self, session_id: Uuid) -> bool;

    async fn get(&self, session_id: Uuid, key: &str) -> Option<Value>;

    async fn put(&self, session_id: Uuid, key: &str, value: Value);

    /// Remove and return the value under `key`
    async fn remove(&self, session_id: Uuid, key: &str) -> Option<Value>;
}

/// In-process session store. Sessions expire after `timeout` without access.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Cache<Uuid, Arc<DashMap<String, Value>>>,
}

impl MemorySessionStore {
    pub fn new(timeout: Duration, capacity: u64) -> Self {
        Self {
            sessions: Cache::builder().max_capacity(capacity).time_to_idle(timeout).build(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.timeout, config.capacity)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(id, Arc::new(DashMap::new())).await;
        id
    }

    async fn exists(&self, session_id: Uuid) -> bool {
        self.sessions.get(&session_id).await.is_some()
    }

    async fn get(&self, session_id: Uuid, key: &str) -> Option<Value> {
        let data = self.sessions.get(&session_id).await?;
        data.get(key).map(|entry| entry.value().clone())
    }

    async fn put(&self, session_id: Uuid, key: &str, value: Value) {
        let data = self
            .sessions
            .get_with(session_id, async { Arc::new(DashMap::new()) })
            .await;
        data.insert(key.to_string(), value);
    }

    async fn remove(&self, session_id: Uuid, key: &str) -> Option<Value> {
        let data = self.sessions.get(&session_id).await?;
        data.remove(key).map(|(_, value)| value)
    }
}

/// Handle to the current request's session.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(id: Uuid, store: Arc<dyn SessionStore>) -> Self {
        Self { id, store }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Read a typed value. A value that no longer decodes is treated as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.store.get(self.id, key).await?;
        decode(key, value)
    }

    pub async fn insert<T: Serialize>(&self, key: &str, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.store.put(self.id, key, value).await;
        Ok(())
    }

    /// Remove a value, returning it if it was present and decodes as `T`
    pub async fn remove<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.store.remove(self.id, key).await?;
        decode(key, value)
    }

    pub async fn flash(&self, message: impl Into<String>) {
        self.store.put(self.id, FLASH_KEY, Value::String(message.into())).await;
    }

    pub async fn flash_error(&self, message: impl Into<String>) {
        self.store.put(self.id, ERROR_KEY, Value::String(message.into())).await;
    }

    /// Pop the pending flash and error messages, in that order
    pub async fn take_messages(&self) -> (Option<String>, Option<String>) {
        (self.remove(FLASH_KEY).await, self.remove(ERROR_KEY).await)
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(key, error = %e, "Discarding undecodable session value");
            None
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| Error::Internal {
            operation: "load session: session middleware is not installed".to_string(),
        })
    }
}

/// Find the session id in the `Cookie` header
fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Uuid> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = cookie_header.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            if let Some((name, value)) = cookie.trim().split_once('=') {
                if name == cookie_name {
                    return Uuid::parse_str(value).ok();
                }
            }
        }
    }
    None
}

pub fn create_session_cookie(session_id: Uuid, config: &SessionConfig) -> String {
    let max_age = config.timeout.as_secs();
    let secure = if config.cookie_secure { "; Secure" } else { "" };

    format!(
        "{}={}; Path=/; HttpOnly{}; SameSite={}; Max-Age={}",
        config.cookie_name, session_id, secure, config.cookie_same_site, max_age
    )
}

/// Attach a [`Session`] to every request, starting one when the cookie is missing or stale.
pub async fn session_middleware(State(state): State<AppState>, mut request: Request<Body>, next: Next) -> Response {
    let config = &state.config.session;

    let existing = match session_id_from_headers(request.headers(), &config.cookie_name) {
        Some(id) if state.sessions.exists(id).await => Some(id),
        _ => None,
    };
    let (session_id, is_new) = match existing {
        Some(id) => (id, false),
        None => {
            let id = state.sessions.create().await;
            debug!(session_id = %id, "Started session");
            (id, true)
        }
    };

    request
        .extensions_mut()
        .insert(Session::new(session_id, Arc::clone(&state.sessions)));

    let mut response = next.run(request).await;

    if is_new {
        match HeaderValue::from_str(&create_session_cookie(session_id, config)) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(e) => warn!(error = %e, "Could not encode session cookie"),
        }
    }

    response
}
