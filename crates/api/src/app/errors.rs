use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use kardex_accounts::FlowError;

/// Map a flow failure to its HTTP response.
pub fn flow_error_to_response(err: FlowError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        FlowError::Conflict => json_error(StatusCode::CONFLICT, "conflict", message),
        FlowError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", message)
        }
        FlowError::NotVerified => json_error(StatusCode::UNAUTHORIZED, "not_verified", message),
        FlowError::InvalidOrExpiredCode => {
            json_error(StatusCode::BAD_REQUEST, "invalid_or_expired_code", message)
        }
        FlowError::CodeExpired => json_error(StatusCode::BAD_REQUEST, "code_expired", message),
        FlowError::CodeMismatch => json_error(StatusCode::BAD_REQUEST, "code_mismatch", message),
        FlowError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, "unauthorized", message),
        FlowError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", message),
        FlowError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", message),
        FlowError::AlreadySignedOut => {
            json_error(StatusCode::NOT_FOUND, "session_closed", message)
        }
        FlowError::EmailDelivery => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "email_delivery_failed", message)
        }
        FlowError::Validation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg)
        }
        FlowError::Internal(detail) => {
            // Backend detail goes to the log, not to the caller.
            tracing::error!(error = %detail, "internal error");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
