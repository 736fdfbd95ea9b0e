pub mod admin;
pub mod builder;
pub mod proposer;

use axum::{http::StatusCode, response::IntoResponse};

pub(crate) async fn handle_status_check() -> impl IntoResponse {
    StatusCode::OK
}
