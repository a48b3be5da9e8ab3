use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument, warn};

use super::dto::{CreateUserRequest, UpdateUserRequest};
use crate::auth::{is_valid_email, password::hash_password};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{NewUser, User, UserPatch};

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.store.list_users().await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.store.get_user(id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(mut body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    body.email = body.email.trim().to_lowercase();
    if !is_valid_email(&body.email) {
        warn!(email = %body.email, "invalid email");
        return Err(ApiError::Validation("invalid email".into()));
    }

    let password_hash = hash_password(&body.password)?;
    let user = state
        .store
        .create_user(NewUser {
            name: body.name,
            email: body.email,
            password_hash,
        })
        .await?;
    info!(user_id = user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let email = match body.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            if !is_valid_email(&email) {
                warn!(%email, "invalid email");
                return Err(ApiError::Validation("invalid email".into()));
            }
            Some(email)
        }
        None => None,
    };

    // Blank passwords mean "keep the current credential".
    let password_hash = match body.new_password.as_deref() {
        Some(p) if !p.trim().is_empty() => Some(hash_password(p)?),
        _ => None,
    };

    let user = state
        .store
        .update_user(
            id,
            UserPatch {
                name: body.name,
                email,
                password_hash,
            },
        )
        .await?;
    info!(user_id = id, "user updated");
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_user(id).await?;
    info!(user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
