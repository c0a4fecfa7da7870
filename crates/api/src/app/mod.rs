//! HTTP application wiring (Axum router + handlers).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use kardex_accounts::AccountFlows;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(flows: Arc<AccountFlows>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::system::health))
        .nest("/api/v1/users", routes::users::router())
        .layer(Extension(flows))
}
