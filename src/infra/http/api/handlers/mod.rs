//! Request handlers for the catalog API.
//!
//! Listing handlers share [`serve_listing`]: a cached response for the exact
//! request is replayed as-is, otherwise the page is rendered with its
//! pagination headers and mirrored into the response cache.

mod categories;
mod health;
mod products;

pub use categories::{
    create_category, delete_category, get_category, list_categories, update_category,
};
pub use health::health;
pub use products::{create_product, delete_product, get_product, list_products, update_product};

use std::future::Future;

use axum::Json;
use axum::body::Body;
use bytes::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::form_urlencoded;

use crate::application::catalog::{CatalogError, CatalogService, ListingPage, Lookup};
use crate::application::pagination::{LinkTarget, link_header};
use crate::cache::{Cacheable, CachedListing, request_signature};

use super::error::ApiError;

const INCLUDE_PARAM: &str = "include";
const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Acknowledgement body for writes.
#[derive(Debug, Serialize)]
pub struct WriteAck<I: Serialize> {
    pub message: String,
    pub id: I,
}

fn json_response(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn encode<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|err| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            super::error::codes::STORE,
            "Failed to encode response",
            None,
        )
        .with_detail(err.to_string())
    })
}

/// True when the query asks for the owning category to be embedded.
fn wants_category(query: Option<&str>) -> bool {
    form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .any(|(key, value)| key == INCLUDE_PARAM && value.split(',').any(|v| v == "category"))
}

fn link_target(uri: &Uri, headers: &HeaderMap) -> LinkTarget {
    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or_default().trim())
        .filter(|value| !value.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .unwrap_or("localhost");

    LinkTarget::new(scheme, host, uri.path(), uri.query())
}

fn render_listing<T: Serialize>(
    page: &ListingPage<T>,
    target: &LinkTarget,
) -> Result<(Response, CachedListing), ApiError> {
    let body = encode(&page.items)?;
    let mut response = json_response(StatusCode::OK, body.clone());
    let headers = response.headers_mut();

    for (name, value) in page.pagination.header_values() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            headers.insert(name, value);
        }
    }

    let links = page.pagination.links(target, page.returned);
    if !links.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&link_header(&links)) {
            headers.insert(header::LINK, value);
        }
    }

    let listing = CachedListing::new(StatusCode::OK, headers, body);
    Ok((response, listing))
}

/// Replay the cached response for this request or render and cache a fresh one.
async fn serve_listing<C, T, F, Fut>(
    service: &CatalogService<C>,
    uri: &Uri,
    headers: &HeaderMap,
    load: F,
) -> Result<Response, ApiError>
where
    C: Cacheable,
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ListingPage<T>, CatalogError>>,
{
    let signature = request_signature(uri.path(), uri.query());
    if let Some(cached) = service.cached_listing(&signature).await {
        return Ok(cached.into_response());
    }

    let page = load().await?;
    let (response, listing) = render_listing(&page, &link_target(uri, headers))?;
    service.mirror_listing(signature, listing);
    Ok(response)
}

fn lookup_response<T: Serialize>(lookup: Lookup<T>) -> Result<Response, ApiError> {
    match lookup {
        Lookup::Cached(payload) => Ok(json_response(StatusCode::OK, payload)),
        Lookup::Loaded(entity) => Ok(json_response(StatusCode::OK, encode(&entity)?)),
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::from(CatalogError::InvalidBody(err.to_string())))
}

fn ack<I: Serialize>(status: StatusCode, message: String, id: I) -> Response {
    (status, Json(WriteAck { message, id })).into_response()
}
