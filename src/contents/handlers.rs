use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::dto::{CreateContentRequest, UpdateContentRequest};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{ContentPatch, ContentWithTags, NewContent};

#[instrument(skip(state))]
pub async fn list_contents(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContentWithTags>>, ApiError> {
    Ok(Json(state.store.list_contents().await?))
}

#[instrument(skip(state))]
pub async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ContentWithTags>, ApiError> {
    Ok(Json(state.store.get_content(id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_content(
    State(state): State<AppState>,
    Json(body): Json<CreateContentRequest>,
) -> Result<(StatusCode, Json<ContentWithTags>), ApiError> {
    let created = state
        .store
        .create_content(NewContent {
            user_id: body.user_id,
            title: body.title,
            body: body.body,
            status: body.status,
            tag_ids: body.tag_ids,
        })
        .await?;
    info!(content_id = created.content.id, "content created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, body))]
pub async fn update_content(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateContentRequest>,
) -> Result<Json<ContentWithTags>, ApiError> {
    let updated = state
        .store
        .update_content(
            id,
            ContentPatch {
                title: body.title,
                body: body.body,
                status: body.status,
                tag_ids: body.tag_ids,
            },
        )
        .await?;
    info!(content_id = id, "content updated");
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_content(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_content(id).await?;
    info!(content_id = id, "content deleted");
    Ok(StatusCode::NO_CONTENT)
}
