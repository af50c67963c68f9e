use bytes::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::Response;
use serde_json::Value;

use crate::application::catalog::CatalogService;
use crate::domain::entities::Category;

use super::super::error::ApiError;
use super::super::state::ApiState;
use super::{ack, lookup_response, parse_body, serve_listing};

pub async fn list_categories(
    State(state): State<ApiState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let categories: &CatalogService<Category> = &state.categories;
    let query = uri.query();
    serve_listing(categories, &uri, &headers, || categories.list(query)).await
}

pub async fn get_category(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    lookup_response(state.categories.get(&id).await?)
}

pub async fn create_category(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let category: Category = parse_body(&body)?;
    let id = state.categories.create(category).await?;
    Ok(ack(
        StatusCode::CREATED,
        format!("Category with id {id} was created"),
        id,
    ))
}

pub async fn update_category(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let patch: Value = parse_body(&body)?;
    let category = state.categories.update(&id, patch).await?;
    Ok(ack(
        StatusCode::OK,
        format!("Category with id {} was updated", category.id),
        category.id,
    ))
}

pub async fn delete_category(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = state.categories.delete(&id).await?;
    Ok(ack(
        StatusCode::OK,
        format!("Category with id {id} was deleted"),
        id,
    ))
}
