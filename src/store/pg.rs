//! Postgres-backed [`Store`].
//!
//! Multi-table writes (content row + junction rows) run inside one explicit
//! transaction: either every statement commits or none of them do. Dropping a
//! transaction rolls it back, but deliberate aborts call `rollback` so the
//! intent is visible.

use std::collections::HashMap;

use sqlx::PgPool;

use super::{
    check_tag_ids, check_tag_name, check_title, invalid_tag_ids, Content, ContentPatch,
    ContentWithTags, NewContent, NewUser, Store, StoreError, Tag, User, UserPatch,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CONTENT_COLUMNS: &str = "id, user_id, title, body, status, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

async fn resolve_tags<'e, E>(ex: E, tag_ids: &[i64]) -> Result<Vec<Tag>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = ANY($1) ORDER BY id")
        .bind(tag_ids)
        .fetch_all(ex)
        .await
}

async fn tags_for<'e, E>(ex: E, content_id: i64) -> Result<Vec<Tag>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.name
        FROM content_tags ct
        JOIN tags t ON t.id = ct.tag_id
        WHERE ct.content_id = $1
        ORDER BY t.id
        "#,
    )
    .bind(content_id)
    .fetch_all(ex)
    .await
}

/// Surface a unique-constraint violation as a caller error instead of a 500.
fn on_unique(e: sqlx::Error, msg: &str) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::Conflict(msg.to_string()),
        _ => StoreError::Database(e),
    }
}

/// Surface a foreign-key violation (dangling reference) as a caller error.
fn on_fk(e: sqlx::Error, msg: &str) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => StoreError::Validation(msg.to_string()),
        _ => StoreError::Database(e),
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn list_contents(&self) -> Result<Vec<ContentWithTags>, StoreError> {
        let contents = sqlx::query_as::<_, Content>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        // One pass over the junction table instead of a query per content.
        let links = sqlx::query_as::<_, (i64, i64, String)>(
            r#"
            SELECT ct.content_id, t.id, t.name
            FROM content_tags ct
            JOIN tags t ON t.id = ct.tag_id
            ORDER BY t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_content: HashMap<i64, Vec<Tag>> = HashMap::new();
        for (content_id, id, name) in links {
            by_content
                .entry(content_id)
                .or_default()
                .push(Tag { id, name });
        }

        Ok(contents
            .into_iter()
            .map(|content| {
                let tags = by_content.remove(&content.id).unwrap_or_default();
                ContentWithTags { content, tags }
            })
            .collect())
    }

    async fn get_content(&self, id: i64) -> Result<ContentWithTags, StoreError> {
        let content = sqlx::query_as::<_, Content>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("content"))?;

        let tags = tags_for(&self.pool, id).await?;
        Ok(ContentWithTags { content, tags })
    }

    async fn create_content(&self, new: NewContent) -> Result<ContentWithTags, StoreError> {
        check_title(&new.title)?;
        check_tag_ids(&new.tag_ids)?;

        let mut tx = self.pool.begin().await?;

        let content = sqlx::query_as::<_, Content>(&format!(
            "INSERT INTO contents (user_id, title, body, status) \
             VALUES ($1, $2, $3, $4) RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.body)
        .bind(new.status.as_deref().unwrap_or("draft"))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| on_fk(e, "user_id does not reference an existing user"))?;

        let tags = resolve_tags(&mut *tx, &new.tag_ids).await?;
        if tags.len() != new.tag_ids.len() {
            // Some supplied ids were invalid (or duplicated); nothing from
            // this operation survives.
            tx.rollback().await?;
            return Err(invalid_tag_ids());
        }

        for tag in &tags {
            sqlx::query("INSERT INTO content_tags (content_id, tag_id) VALUES ($1, $2)")
                .bind(content.id)
                .bind(tag.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(ContentWithTags { content, tags })
    }

    async fn update_content(
        &self,
        id: i64,
        patch: ContentPatch,
    ) -> Result<ContentWithTags, StoreError> {
        if let Some(title) = &patch.title {
            check_title(title)?;
        }
        if let Some(tag_ids) = &patch.tag_ids {
            check_tag_ids(tag_ids)?;
        }

        let mut tx = self.pool.begin().await?;

        let content = sqlx::query_as::<_, Content>(&format!(
            "UPDATE contents SET \
                 title = COALESCE($2, title), \
                 body = COALESCE($3, body), \
                 status = COALESCE($4, status), \
                 updated_at = now() \
             WHERE id = $1 RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.body)
        .bind(&patch.status)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(content) = content else {
            tx.rollback().await?;
            return Err(StoreError::NotFound("content"));
        };

        let tags = match &patch.tag_ids {
            Some(tag_ids) => {
                let tags = resolve_tags(&mut *tx, tag_ids).await?;
                if tags.len() != tag_ids.len() {
                    tx.rollback().await?;
                    return Err(invalid_tag_ids());
                }
                // Full replacement: drop the old set, write the new one.
                sqlx::query("DELETE FROM content_tags WHERE content_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                for tag in &tags {
                    sqlx::query("INSERT INTO content_tags (content_id, tag_id) VALUES ($1, $2)")
                        .bind(id)
                        .bind(tag.id)
                        .execute(&mut *tx)
                        .await?;
                }
                tags
            }
            None => tags_for(&mut *tx, id).await?,
        };

        tx.commit().await?;
        Ok(ContentWithTags { content, tags })
    }

    async fn delete_content(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM contents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("content"));
        }
        Ok(())
    }

    async fn link_tag(&self, content_id: i64, tag_id: i64) -> Result<(), StoreError> {
        let found = sqlx::query_as::<_, (i64,)>(
            "SELECT c.id FROM contents c, tags t WHERE c.id = $1 AND t.id = $2",
        )
        .bind(content_id)
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await?;
        if found.is_none() {
            return Err(StoreError::NotFound("content or tag"));
        }

        // Re-linking an already linked pair is a no-op.
        sqlx::query(
            "INSERT INTO content_tags (content_id, tag_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(content_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unlink_tag(&self, content_id: i64, tag_id: i64) -> Result<(), StoreError> {
        let found = sqlx::query_as::<_, (i64,)>(
            "SELECT c.id FROM contents c, tags t WHERE c.id = $1 AND t.id = $2",
        )
        .bind(content_id)
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await?;
        if found.is_none() {
            return Err(StoreError::NotFound("content or tag"));
        }

        sqlx::query("DELETE FROM content_tags WHERE content_id = $1 AND tag_id = $2")
            .bind(content_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    async fn get_tag(&self, id: i64) -> Result<Tag, StoreError> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("tag"))
    }

    async fn create_tag(&self, name: &str) -> Result<Tag, StoreError> {
        check_tag_name(name)?;
        sqlx::query_as::<_, Tag>("INSERT INTO tags (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| on_unique(e, "a tag with this name already exists"))
    }

    async fn rename_tag(&self, id: i64, name: &str) -> Result<Tag, StoreError> {
        check_tag_name(name)?;
        sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = $2, updated_at = now() WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| on_unique(e, "a tag with this name already exists"))?
        .ok_or(StoreError::NotFound("tag"))
    }

    async fn delete_tag(&self, id: i64) -> Result<(), StoreError> {
        // Junction rows cascade; contents are left alone even if this was
        // their last tag.
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("tag"));
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(users)
    }

    async fn get_user(&self, id: i64) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("user"))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash) \
             VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_unique(e, "email already registered"))
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                 name = COALESCE($2, name), \
                 email = COALESCE($3, email), \
                 password_hash = COALESCE($4, password_hash), \
                 updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(&patch.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| on_unique(e, "email already registered"))?
        .ok_or(StoreError::NotFound("user"))
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }
}
