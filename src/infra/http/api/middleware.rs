use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::error::ApiError;
use super::state::ApiState;

/// Caller that passed basic authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

pub async fn basic_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some((username, password)) = basic_credentials(request.headers().get(header::AUTHORIZATION))
    else {
        return ApiError::unauthorized().into_response();
    };

    if !state.users.verify(&username, &password).await {
        return ApiError::unauthorized()
            .with_detail(format!("rejected credentials for `{username}`"))
            .into_response();
    }

    let user = AuthenticatedUser { username };
    request.extensions_mut().insert(user.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    response
}

fn basic_credentials(value: Option<&HeaderValue>) -> Option<(String, String)> {
    let raw = value?.to_str().ok()?;
    let (scheme, encoded) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
