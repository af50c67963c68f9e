use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use serde::{Deserialize, Serialize};

use super::keys::Namespace;
use super::lookup_outcome;
use super::store::{CacheError, SharedStore};

/// A listing response captured for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedListing {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl CachedListing {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: String) -> Self {
        let mut stored_headers = Vec::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            if let Ok(value) = value.to_str() {
                stored_headers.push((name.as_str().to_string(), value.to_string()));
            }
        }

        Self {
            status: status.as_u16(),
            headers: stored_headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(stored, _)| stored.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                headers.append(name, value);
            }
        }

        response
    }
}

/// Whole listing responses keyed by request signature.
#[derive(Clone)]
pub struct ResponseCache {
    store: SharedStore,
}

impl ResponseCache {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, signature: &str) -> Option<CachedListing> {
        let payload = lookup_outcome(
            Namespace::Response,
            signature,
            self.store.get(Namespace::Response, signature).await,
        )?;
        serde_json::from_str(&payload).ok()
    }

    pub async fn set(&self, signature: &str, listing: &CachedListing) -> Result<(), CacheError> {
        let payload = serde_json::to_string(listing)?;
        self.store
            .set(Namespace::Response, signature, payload)
            .await
    }
}
