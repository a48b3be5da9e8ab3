use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::dto::{LinkRequest, LinkResponse, TagNameRequest};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Tag;

#[instrument(skip(state))]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.store.list_tags().await?))
}

#[instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.store.get_tag(id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_tag(
    State(state): State<AppState>,
    Json(body): Json<TagNameRequest>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let tag = state.store.create_tag(&body.name).await?;
    info!(tag_id = tag.id, name = %tag.name, "tag created");
    Ok((StatusCode::CREATED, Json(tag)))
}

#[instrument(skip(state, body))]
pub async fn rename_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TagNameRequest>,
) -> Result<Json<Tag>, ApiError> {
    let tag = state.store.rename_tag(id, &body.name).await?;
    info!(tag_id = id, name = %tag.name, "tag renamed");
    Ok(Json(tag))
}

#[instrument(skip(state))]
pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_tag(id).await?;
    info!(tag_id = id, "tag deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn link_tag(
    State(state): State<AppState>,
    Json(body): Json<LinkRequest>,
) -> Result<Json<LinkResponse>, ApiError> {
    state.store.link_tag(body.content_id, body.tag_id).await?;
    info!(content_id = body.content_id, tag_id = body.tag_id, "tag linked");
    Ok(Json(LinkResponse {
        message: "tag linked",
    }))
}

#[instrument(skip(state, body))]
pub async fn unlink_tag(
    State(state): State<AppState>,
    Json(body): Json<LinkRequest>,
) -> Result<Json<LinkResponse>, ApiError> {
    state.store.unlink_tag(body.content_id, body.tag_id).await?;
    info!(content_id = body.content_id, tag_id = body.tag_id, "tag unlinked");
    Ok(Json(LinkResponse {
        message: "tag unlinked",
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::app::build_app;
    use crate::state::AppState;
    use crate::test_util::request;

    #[tokio::test]
    async fn tag_crud_round_trip() {
        let app = build_app(AppState::fake());

        let (status, created) =
            request(&app, "POST", "/api/tags", Some(json!({"name": "Trabalho"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created, json!({"id": 1, "name": "Trabalho"}));

        let (status, fetched) = request(&app, "GET", "/api/tags/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (status, renamed) =
            request(&app, "PUT", "/api/tags/1", Some(json!({"name": "Estudo"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["name"], "Estudo");

        let (status, _) = request(&app, "DELETE", "/api/tags/1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, listed) = request(&app, "GET", "/api/tags", None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn duplicate_and_empty_names_are_rejected() {
        let app = build_app(AppState::fake());

        request(&app, "POST", "/api/tags", Some(json!({"name": "Trabalho"}))).await;

        let (status, resp) =
            request(&app, "POST", "/api/tags", Some(json!({"name": "Trabalho"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(resp["error"].is_string());

        let (status, _) = request(&app, "POST", "/api/tags", Some(json!({"name": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rename_to_taken_name_is_rejected() {
        let app = build_app(AppState::fake());
        request(&app, "POST", "/api/tags", Some(json!({"name": "Trabalho"}))).await;
        request(&app, "POST", "/api/tags", Some(json!({"name": "Estudo"}))).await;

        let (status, _) =
            request(&app, "PUT", "/api/tags/2", Some(json!({"name": "Trabalho"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, tags) = request(&app, "GET", "/api/tags", None).await;
        assert_eq!(
            tags,
            json!([{"id": 1, "name": "Trabalho"}, {"id": 2, "name": "Estudo"}])
        );
    }

    #[tokio::test]
    async fn missing_tag_is_404_for_get_put_delete() {
        let app = build_app(AppState::fake());
        let (status, _) = request(&app, "GET", "/api/tags/9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = request(&app, "PUT", "/api/tags/9", Some(json!({"name": "X"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = request(&app, "DELETE", "/api/tags/9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn link_and_unlink_manage_a_single_association() {
        let app = build_app(crate::test_util::seeded_state().await);

        let (_, created) = request(
            &app,
            "POST",
            "/api/contents",
            Some(json!({"user_id": 1, "titulo": "T", "tagIds": [1]})),
        )
        .await;
        let id = created["id"].as_i64().unwrap();

        let (status, resp) = request(
            &app,
            "POST",
            "/api/tags/link",
            Some(json!({"content_id": id, "tag_id": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(resp["message"].is_string());

        let (_, fetched) = request(&app, "GET", &format!("/api/contents/{id}"), None).await;
        assert_eq!(fetched["tags"].as_array().unwrap().len(), 2);

        let (status, _) = request(
            &app,
            "DELETE",
            "/api/tags/unlink",
            Some(json!({"content_id": id, "tag_id": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, fetched) = request(&app, "GET", &format!("/api/contents/{id}"), None).await;
        assert_eq!(fetched["tags"], json!([{"id": 1, "name": "Trabalho"}]));
    }

    #[tokio::test]
    async fn link_with_missing_content_or_tag_is_404() {
        let app = build_app(AppState::fake());
        let (status, _) = request(
            &app,
            "POST",
            "/api/tags/link",
            Some(json!({"content_id": 1, "tag_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
