//! Bearer-token extraction and the admin gate.

use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use kardex_accounts::{AccountFlows, Identity};
use kardex_auth::Role;

use crate::app::errors;

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, Response> {
    let unauthorized =
        || errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "access token required");

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(unauthorized)?;

    let header = header.to_str().map_err(|_| unauthorized())?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(unauthorized)?
        .trim();

    if token.is_empty() {
        return Err(unauthorized());
    }

    Ok(token)
}

/// Resolve the bearer token and require the ADMIN capability.
pub async fn require_admin(
    flows: &AccountFlows,
    headers: &HeaderMap,
) -> Result<Identity, Response> {
    let token = extract_bearer(headers)?;
    flows
        .require_role(token, Role::Admin)
        .await
        .map_err(errors::flow_error_to_response)
}
