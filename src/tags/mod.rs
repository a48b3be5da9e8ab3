use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::state::AppState;

mod dto;
pub mod handlers;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(handlers::list_tags).post(handlers::create_tag))
        .route(
            "/tags/:id",
            get(handlers::get_tag)
                .put(handlers::rename_tag)
                .delete(handlers::delete_tag),
        )
        .route("/tags/link", post(handlers::link_tag))
        .route("/tags/unlink", delete(handlers::unlink_tag))
}
