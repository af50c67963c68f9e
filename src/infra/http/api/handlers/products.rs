use bytes::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::Response;
use serde_json::Value;

use crate::application::catalog::{CatalogError, CatalogService, ListRequest, ListingPage};
use crate::domain::entities::Product;

use super::super::error::ApiError;
use super::super::state::ApiState;
use super::{
    ack, encode, json_response, lookup_response, parse_body, serve_listing, wants_category,
};

pub async fn list_products(
    State(state): State<ApiState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let products: &CatalogService<Product> = &state.products;
    let query = uri.query();
    if !wants_category(query) {
        return serve_listing(products, &uri, &headers, || products.list(query)).await;
    }

    let repo = &state.products_repo;
    serve_listing(products, &uri, &headers, || async move {
        let request = ListRequest::parse(query, products.column_aliases())?;
        let rows = repo.list_products_with_category(&request.query).await?;
        ListingPage::from_rows(rows, request.pagination)
    })
    .await
}

pub async fn get_product(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    if !wants_category(query.as_deref()) {
        return lookup_response(state.products.get(&id).await?);
    }

    let id = CatalogService::<Product>::parse_id(&id)?;
    let joined = state
        .products_repo
        .find_product_with_category(&id)
        .await
        .map_err(CatalogError::from)?;
    Ok(json_response(StatusCode::OK, encode(&joined)?))
}

pub async fn create_product(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let product: Product = parse_body(&body)?;
    let id = state.products.create(product).await?;
    Ok(ack(
        StatusCode::CREATED,
        format!("Product with id {id} was created"),
        id,
    ))
}

/// Fields absent from the body keep their stored values.
pub async fn update_product(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let patch: Value = parse_body(&body)?;
    let product = state.products.update(&id, patch).await?;
    Ok(ack(
        StatusCode::OK,
        format!("Product with id {} was updated", product.id),
        product.id,
    ))
}

pub async fn delete_product(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = state.products.delete(&id).await?;
    Ok(ack(
        StatusCode::OK,
        format!("Product with id {id} was deleted"),
        id,
    ))
}
