use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::catalog::CatalogError;
use crate::application::error::ErrorReport;
use crate::application::ordering::OrderingError;
use crate::application::pagination::PaginationError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const INVALID_ID: &str = "invalid_id";
    pub const VALIDATION: &str = "validation_error";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const STORE: &str = "store_error";
    pub const PAGINATION: &str = "pagination_error";
    pub const PAGE_NOT_FOUND: &str = "page_not_found";
    pub const BAD_PARAMETERS: &str = "bad_parameters";
    pub const BAD_ORDER_BY: &str = "bad_order_by";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    /// Logged with the response, never sent to the client.
    detail: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn bad_request(code: &'static str, message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Authorization failed",
            None,
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn invalid_body(hint: impl Into<String>) -> Self {
        Self::bad_request(
            codes::INVALID_REQUEST,
            "Invalid request body",
            Some(hint.into()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let logged = self
            .detail
            .as_deref()
            .or(self.hint.as_deref())
            .unwrap_or(self.message)
            .to_string();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"catalog\""),
            );
        }
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, logged),
        )
        .attach(&mut response);
        response
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ApiError::not_found("Resource not found"),
            RepoError::Duplicate { constraint } => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Duplicate record",
                Some(constraint),
            ),
            RepoError::InvalidInput { message } => ApiError::bad_request(
                codes::INVALID_INPUT,
                "Invalid input",
                None,
            )
            .with_detail(message),
            RepoError::Integrity { message } => ApiError::bad_request(
                codes::INTEGRITY,
                "Integrity constraint violated",
                None,
            )
            .with_detail(message),
            RepoError::Ordering(err) => err.into(),
            RepoError::Timeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            RepoError::Persistence(message) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::STORE,
                "Store error",
                None,
            )
            .with_detail(message),
        }
    }
}

impl From<OrderingError> for ApiError {
    fn from(err: OrderingError) -> Self {
        match err {
            OrderingError::InjectionAttempt { column } => {
                tracing::warn!(
                    target = "catalog::http::security",
                    column = %column,
                    "rejected unsafe sort column"
                );
                ApiError::bad_request(codes::BAD_PARAMETERS, "Bad parameters given", None)
                    .with_detail(format!("unsafe sort column `{column}`"))
            }
            OrderingError::InvalidDirection { value } => ApiError::bad_request(
                codes::BAD_ORDER_BY,
                "Bad order by value",
                Some("Example \"orderBy=price:asc\"".to_string()),
            )
            .with_detail(format!("orderBy `{value}`")),
        }
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        match err {
            PaginationError::InvalidParameter { .. } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::PAGINATION,
                "Error in pagination values",
                None,
            )
            .with_detail(err.to_string()),
            PaginationError::PageOutOfRange { .. } => {
                ApiError::bad_request(codes::PAGE_NOT_FOUND, "Page does not exist", None)
                    .with_detail(err.to_string())
            }
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Pagination(err) => err.into(),
            CatalogError::Ordering(err) => err.into(),
            CatalogError::Repo(err) => err.into(),
            CatalogError::Domain(DomainError::Validation { message }) => {
                ApiError::bad_request(codes::VALIDATION, "Validation failed", Some(message))
            }
            CatalogError::InvalidId { kind, value } => {
                let message = match kind {
                    "category" => "Bad category id",
                    _ => "Bad product id",
                };
                ApiError::bad_request(codes::INVALID_ID, message, None)
                    .with_detail(format!("{kind} id `{value}`"))
            }
            CatalogError::InvalidBody(hint) => ApiError::invalid_body(hint),
        }
    }
}
