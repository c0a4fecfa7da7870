//! Account endpoints: sign-up, verification, session lifecycle, admin ops.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;

use kardex_accounts::{AccountFlows, NewAccount};
use kardex_core::UserId;

use crate::app::{dto, errors};
use crate::middleware;

/// Cookie carrying the refresh token, path-scoped so the browser only ever
/// presents it to the rotation endpoint.
const REFRESH_COOKIE: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/api/v1/users/refresh-token";
const REFRESH_COOKIE_MAX_AGE: time::Duration = time::Duration::days(7);

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/sign-up", post(sign_up))
        .route("/verify-email", post(verify_email))
        .route("/sign-in", post(sign_in))
        .route("/sign-out", post(sign_out))
        .route("/refresh-token", post(refresh_token))
        .route("/delete", delete(delete_user))
}

fn refresh_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_secure(false);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_max_age(REFRESH_COOKIE_MAX_AGE);
    cookie.set_path(REFRESH_COOKIE_PATH);
    cookie
}

pub async fn sign_up(
    Extension(flows): Extension<Arc<AccountFlows>>,
    Json(body): Json<dto::SignUpRequest>,
) -> axum::response::Response {
    let account = NewAccount {
        username: body.username,
        email: body.email,
        password: body.password,
        full_name: body.full_name,
    };

    match flows.sign_up(account).await {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Account created. Check your email for the verification code.",
                "user_id": user_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::flow_error_to_response(e),
    }
}

pub async fn verify_email(
    Extension(flows): Extension<Arc<AccountFlows>>,
    Json(body): Json<dto::VerifyEmailRequest>,
) -> axum::response::Response {
    match flows.verify_email(&body.verification_code).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Account verified successfully." })),
        )
            .into_response(),
        Err(e) => errors::flow_error_to_response(e),
    }
}

pub async fn sign_in(
    Extension(flows): Extension<Arc<AccountFlows>>,
    jar: CookieJar,
    Json(body): Json<dto::SignInRequest>,
) -> axum::response::Response {
    let outcome = match flows.sign_in(&body.email, &body.password).await {
        Ok(outcome) => outcome,
        Err(e) => return errors::flow_error_to_response(e),
    };

    let jar = jar.add(refresh_cookie(outcome.refresh.token.clone()));
    (
        jar,
        (
            StatusCode::OK,
            Json(json!({
                "message": "Signed in successfully.",
                "access_token": outcome.access.token,
                "token_type": "bearer",
            })),
        ),
    )
        .into_response()
}

pub async fn sign_out(
    Extension(flows): Extension<Arc<AccountFlows>>,
    Json(body): Json<dto::UserIdRequest>,
) -> axum::response::Response {
    let user_id: UserId = match body.user_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "a valid user id is required",
            )
        }
    };

    match flows.sign_out(user_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Session closed successfully." })),
        )
            .into_response(),
        Err(e) => errors::flow_error_to_response(e),
    }
}

pub async fn refresh_token(
    Extension(flows): Extension<Arc<AccountFlows>>,
    jar: CookieJar,
) -> axum::response::Response {
    let Some(cookie) = jar.get(REFRESH_COOKIE) else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "refresh token cookie missing",
        );
    };

    let outcome = match flows.refresh(cookie.value()).await {
        Ok(outcome) => outcome,
        Err(e) => return errors::flow_error_to_response(e),
    };

    let jar = jar.add(refresh_cookie(outcome.refresh.token.clone()));
    (
        jar,
        (
            StatusCode::OK,
            Json(json!({
                "message": "Tokens issued successfully.",
                "access_token": outcome.access.token,
                "token_type": "bearer",
            })),
        ),
    )
        .into_response()
}

pub async fn delete_user(
    Extension(flows): Extension<Arc<AccountFlows>>,
    headers: HeaderMap,
    Json(body): Json<dto::UserIdRequest>,
) -> axum::response::Response {
    if let Err(response) = middleware::require_admin(&flows, &headers).await {
        return response;
    }

    let user_id: UserId = match body.user_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "a valid user id is required",
            )
        }
    };

    match flows.delete_identity(user_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Account deleted successfully." })),
        )
            .into_response(),
        Err(e) => errors::flow_error_to_response(e),
    }
}

pub async fn list_users(
    Extension(flows): Extension<Arc<AccountFlows>>,
    headers: HeaderMap,
) -> axum::response::Response {
    if let Err(response) = middleware::require_admin(&flows, &headers).await {
        return response;
    }

    match flows.list_identities().await {
        Ok(rows) => {
            let users: Vec<_> = rows
                .iter()
                .map(|(identity, profile)| dto::user_summary_to_json(identity, profile))
                .collect();
            (StatusCode::OK, Json(json!(users))).into_response()
        }
        Err(e) => errors::flow_error_to_response(e),
    }
}
