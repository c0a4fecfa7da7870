//! Request/response DTOs and JSON mapping helpers.

use serde::Deserialize;
use serde_json::{json, Value};

use kardex_accounts::{Identity, Profile};

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub verification_code: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserIdRequest {
    pub user_id: String,
}

/// Admin listing row: identity joined with its profile.
pub fn user_summary_to_json(identity: &Identity, profile: &Profile) -> Value {
    json!({
        "user_id": identity.id.to_string(),
        "full_name": profile.full_name,
        "username": identity.username,
        "email": identity.email,
        "role": identity.role.as_str(),
        "status": identity.status.as_str(),
        "verified": identity.verified,
        "created_at": identity.created_at.to_rfc3339(),
        "updated_at": identity.updated_at.to_rfc3339(),
    })
}
