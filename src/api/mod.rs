//! Demo application routes.

pub mod users;

use axum::{routing::get, Router};

use crate::http::server::AppState;

/// Routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/{id}", get(users::get_user))
}
