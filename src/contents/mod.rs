use axum::{routing::get, Router};

use crate::state::AppState;

mod dto;
pub mod handlers;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/contents",
            get(handlers::list_contents).post(handlers::create_content),
        )
        .route(
            "/contents/:id",
            get(handlers::get_content)
                .put(handlers::update_content)
                .delete(handlers::delete_content),
        )
}
