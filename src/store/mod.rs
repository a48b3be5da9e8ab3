//! Persistence seam for the notes service.
//!
//! Handlers only ever see the [`Store`] trait; the Postgres implementation
//! lives in [`pg`], and [`memory`] provides an in-process substitute with the
//! same observable semantics for tests.

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;

pub mod memory;
pub mod pg;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A content row. Wire names (`titulo`, `texto`) are the historical API
/// contract; columns and struct fields stay English.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Content {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "texto")]
    pub body: Option<String>,
    pub status: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Denormalized read model: content fields plus the resolved tag set,
/// assembled at query time.
#[derive(Debug, Clone, Serialize)]
pub struct ContentWithTags {
    #[serde(flatten)]
    pub content: Content,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone)]
pub struct NewContent {
    pub user_id: i64,
    pub title: String,
    pub body: Option<String>,
    pub status: Option<String>,
    pub tag_ids: Vec<i64>,
}

/// Partial update; `None` leaves the field untouched. A present `tag_ids`
/// replaces the whole association set.
#[derive(Debug, Clone, Default)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<String>,
    pub tag_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // contents
    async fn list_contents(&self) -> Result<Vec<ContentWithTags>, StoreError>;
    async fn get_content(&self, id: i64) -> Result<ContentWithTags, StoreError>;
    async fn create_content(&self, new: NewContent) -> Result<ContentWithTags, StoreError>;
    async fn update_content(&self, id: i64, patch: ContentPatch)
        -> Result<ContentWithTags, StoreError>;
    async fn delete_content(&self, id: i64) -> Result<(), StoreError>;
    async fn link_tag(&self, content_id: i64, tag_id: i64) -> Result<(), StoreError>;
    async fn unlink_tag(&self, content_id: i64, tag_id: i64) -> Result<(), StoreError>;

    // tags
    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError>;
    async fn get_tag(&self, id: i64) -> Result<Tag, StoreError>;
    async fn create_tag(&self, name: &str) -> Result<Tag, StoreError>;
    async fn rename_tag(&self, id: i64, name: &str) -> Result<Tag, StoreError>;
    async fn delete_tag(&self, id: i64) -> Result<(), StoreError>;

    // users
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn get_user(&self, id: i64) -> Result<User, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;
    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User, StoreError>;
    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;
}

// Shared business-rule checks so both implementations agree exactly.

pub(crate) fn check_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("titulo must not be empty".into()));
    }
    Ok(())
}

pub(crate) fn check_tag_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("tag name must not be empty".into()));
    }
    Ok(())
}

/// Every note carries at least one tag; an empty list is rejected before any
/// write happens.
pub(crate) fn check_tag_ids(tag_ids: &[i64]) -> Result<(), StoreError> {
    if tag_ids.is_empty() {
        return Err(StoreError::Validation(
            "a note must have at least one tag (tagIds must not be empty)".into(),
        ));
    }
    Ok(())
}

pub(crate) fn invalid_tag_ids() -> StoreError {
    StoreError::Validation("one or more supplied tag ids are invalid".into())
}
