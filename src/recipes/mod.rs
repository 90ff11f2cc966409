pub mod dto;
pub mod handlers;
pub mod images;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    handlers::recipe_routes(max_upload_bytes)
}
