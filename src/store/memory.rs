//! In-memory [`Store`] used by tests.
//!
//! A single mutex around the whole state gives the same all-or-nothing
//! visibility as the Postgres transactions: every operation validates first
//! and only then mutates, so a failed call leaves no partial writes behind.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use time::OffsetDateTime;

use super::{
    check_tag_ids, check_tag_name, check_title, invalid_tag_ids, Content, ContentPatch,
    ContentWithTags, NewContent, NewUser, Store, StoreError, Tag, User, UserPatch,
};

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    tags: BTreeMap<i64, Tag>,
    contents: BTreeMap<i64, Content>,
    links: BTreeSet<(i64, i64)>,
    next_user_id: i64,
    next_tag_id: i64,
    next_content_id: i64,
}

impl Inner {
    fn next_user_id(&mut self) -> i64 {
        self.next_user_id += 1;
        self.next_user_id
    }

    fn next_tag_id(&mut self) -> i64 {
        self.next_tag_id += 1;
        self.next_tag_id
    }

    fn next_content_id(&mut self) -> i64 {
        self.next_content_id += 1;
        self.next_content_id
    }

    /// Same rule as the SQL path: the resolved set must match the supplied
    /// list one-to-one, so unknown or duplicated ids fail the whole call.
    fn resolve_tags(&self, tag_ids: &[i64]) -> Result<Vec<Tag>, StoreError> {
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::new();
        for id in tag_ids {
            if let Some(tag) = self.tags.get(id) {
                if seen.insert(*id) {
                    resolved.push(tag.clone());
                }
            }
        }
        if resolved.len() != tag_ids.len() {
            return Err(invalid_tag_ids());
        }
        Ok(resolved)
    }

    fn tags_for(&self, content_id: i64) -> Vec<Tag> {
        self.links
            .iter()
            .filter(|(c, _)| *c == content_id)
            .filter_map(|(_, t)| self.tags.get(t).cloned())
            .collect()
    }
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemStore {
    async fn list_contents(&self) -> Result<Vec<ContentWithTags>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .contents
            .values()
            .map(|content| ContentWithTags {
                content: content.clone(),
                tags: inner.tags_for(content.id),
            })
            .collect())
    }

    async fn get_content(&self, id: i64) -> Result<ContentWithTags, StoreError> {
        let inner = self.inner.lock().unwrap();
        let content = inner
            .contents
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("content"))?;
        let tags = inner.tags_for(id);
        Ok(ContentWithTags { content, tags })
    }

    async fn create_content(&self, new: NewContent) -> Result<ContentWithTags, StoreError> {
        check_title(&new.title)?;
        check_tag_ids(&new.tag_ids)?;

        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&new.user_id) {
            return Err(StoreError::Validation(
                "user_id does not reference an existing user".into(),
            ));
        }
        let tags = inner.resolve_tags(&new.tag_ids)?;

        let now = OffsetDateTime::now_utc();
        let id = inner.next_content_id();
        let content = Content {
            id,
            user_id: new.user_id,
            title: new.title,
            body: new.body,
            status: new.status.unwrap_or_else(|| "draft".into()),
            created_at: now,
            updated_at: now,
        };
        inner.contents.insert(id, content.clone());
        for tag in &tags {
            inner.links.insert((id, tag.id));
        }
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

        let mut inner = self.inner.lock().unwrap();
        if !inner.contents.contains_key(&id) {
            return Err(StoreError::NotFound("content"));
        }

        // Validate the replacement set before touching anything.
        let new_tags = match &patch.tag_ids {
            Some(tag_ids) => Some(inner.resolve_tags(tag_ids)?),
            None => None,
        };

        let content = inner.contents.get_mut(&id).unwrap();
        if let Some(title) = patch.title {
            content.title = title;
        }
        if let Some(body) = patch.body {
            content.body = Some(body);
        }
        if let Some(status) = patch.status {
            content.status = status;
        }
        content.updated_at = OffsetDateTime::now_utc();
        let content = content.clone();

        let tags = match new_tags {
            Some(tags) => {
                inner.links.retain(|(c, _)| *c != id);
                for tag in &tags {
                    inner.links.insert((id, tag.id));
                }
                tags
            }
            None => inner.tags_for(id),
        };
        Ok(ContentWithTags { content, tags })
    }

    async fn delete_content(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.contents.remove(&id).is_none() {
            return Err(StoreError::NotFound("content"));
        }
        inner.links.retain(|(c, _)| *c != id);
        Ok(())
    }

    async fn link_tag(&self, content_id: i64, tag_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.contents.contains_key(&content_id) || !inner.tags.contains_key(&tag_id) {
            return Err(StoreError::NotFound("content or tag"));
        }
        inner.links.insert((content_id, tag_id));
        Ok(())
    }

    async fn unlink_tag(&self, content_id: i64, tag_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.contents.contains_key(&content_id) || !inner.tags.contains_key(&tag_id) {
            return Err(StoreError::NotFound("content or tag"));
        }
        inner.links.remove(&(content_id, tag_id));
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tags.values().cloned().collect())
    }

    async fn get_tag(&self, id: i64) -> Result<Tag, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .tags
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("tag"))
    }

    async fn create_tag(&self, name: &str) -> Result<Tag, StoreError> {
        check_tag_name(name)?;
        let mut inner = self.inner.lock().unwrap();
        if inner.tags.values().any(|t| t.name == name) {
            return Err(StoreError::Conflict(
                "a tag with this name already exists".into(),
            ));
        }
        let id = inner.next_tag_id();
        let tag = Tag {
            id,
            name: name.to_string(),
        };
        inner.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn rename_tag(&self, id: i64, name: &str) -> Result<Tag, StoreError> {
        check_tag_name(name)?;
        let mut inner = self.inner.lock().unwrap();
        if !inner.tags.contains_key(&id) {
            return Err(StoreError::NotFound("tag"));
        }
        if inner.tags.values().any(|t| t.id != id && t.name == name) {
            return Err(StoreError::Conflict(
                "a tag with this name already exists".into(),
            ));
        }
        let tag = inner.tags.get_mut(&id).unwrap();
        tag.name = name.to_string();
        Ok(tag.clone())
    }

    async fn delete_tag(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.tags.remove(&id).is_none() {
            return Err(StoreError::NotFound("tag"));
        }
        // Cascade removes the links only; a content left with zero tags is
        // not re-validated here.
        inner.links.retain(|(_, t)| *t != id);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().cloned().collect())
    }

    async fn get_user(&self, id: i64) -> Result<User, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict("email already registered".into()));
        }
        let now = OffsetDateTime::now_utc();
        let id = inner.next_user_id();
        let user = User {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&id) {
            return Err(StoreError::NotFound("user"));
        }
        if let Some(email) = &patch.email {
            if inner.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Conflict("email already registered".into()));
            }
        }
        let user = inner.users.get_mut(&id).unwrap();
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.contents.values().any(|c| c.user_id == id) {
            // Mirrors the FK restriction in Postgres: contents keep their
            // owner alive.
            return Err(StoreError::Internal(
                "user is still referenced by contents".into(),
            ));
        }
        if inner.users.remove(&id).is_none() {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemStore, i64, Vec<i64>) {
        let store = MemStore::new();
        let user = store
            .create_user(NewUser {
                name: "Ana".into(),
                email: "ana@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        let mut tag_ids = Vec::new();
        for name in ["Trabalho", "Estudo", "Pessoal"] {
            tag_ids.push(store.create_tag(name).await.unwrap().id);
        }
        (store, user.id, tag_ids)
    }

    fn new_content(user_id: i64, tag_ids: &[i64]) -> NewContent {
        NewContent {
            user_id,
            title: "T".into(),
            body: Some("B".into()),
            status: None,
            tag_ids: tag_ids.to_vec(),
        }
    }

    #[tokio::test]
    async fn created_content_carries_exactly_the_resolved_tags() {
        let (store, user_id, tags) = seeded().await;
        let created = store
            .create_content(new_content(user_id, &[tags[0], tags[1]]))
            .await
            .unwrap();
        assert_eq!(created.content.status, "draft");
        let ids: Vec<i64> = created.tags.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![tags[0], tags[1]]);
    }

    #[tokio::test]
    async fn deleting_a_sole_tag_leaves_the_content_with_zero_tags() {
        // Known gap preserved on purpose: tag deletion does not re-validate
        // the at-least-one-tag rule.
        let (store, user_id, tags) = seeded().await;
        let created = store
            .create_content(new_content(user_id, &[tags[0]]))
            .await
            .unwrap();

        store.delete_tag(tags[0]).await.unwrap();

        let fetched = store.get_content(created.content.id).await.unwrap();
        assert!(fetched.tags.is_empty());
        assert_eq!(fetched.content.title, "T");
    }

    #[tokio::test]
    async fn replacing_tags_never_duplicates_shared_members() {
        let (store, user_id, tags) = seeded().await;
        let created = store
            .create_content(new_content(user_id, &[tags[0], tags[1]]))
            .await
            .unwrap();

        let updated = store
            .update_content(
                created.content.id,
                ContentPatch {
                    tag_ids: Some(vec![tags[1], tags[2]]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let ids: Vec<i64> = updated.tags.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![tags[1], tags[2]]);
    }

    #[tokio::test]
    async fn rename_to_taken_name_leaves_both_tags_unchanged() {
        let (store, _, tags) = seeded().await;
        let err = store.rename_tag(tags[1], "Trabalho").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let names: Vec<String> = store
            .list_tags()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Trabalho", "Estudo", "Pessoal"]);
    }

    #[tokio::test]
    async fn linking_twice_is_a_no_op_and_unlink_removes_the_pair() {
        let (store, user_id, tags) = seeded().await;
        let created = store
            .create_content(new_content(user_id, &[tags[0]]))
            .await
            .unwrap();
        let id = created.content.id;

        store.link_tag(id, tags[1]).await.unwrap();
        store.link_tag(id, tags[1]).await.unwrap();
        assert_eq!(store.get_content(id).await.unwrap().tags.len(), 2);

        store.unlink_tag(id, tags[1]).await.unwrap();
        assert_eq!(store.get_content(id).await.unwrap().tags.len(), 1);
    }

    #[tokio::test]
    async fn link_with_missing_side_is_not_found() {
        let (store, user_id, tags) = seeded().await;
        let created = store
            .create_content(new_content(user_id, &[tags[0]]))
            .await
            .unwrap();

        let err = store.link_tag(created.content.id, 999).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        let err = store.link_tag(999, tags[0]).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_creation_leaves_no_rows_behind() {
        let (store, user_id, tags) = seeded().await;

        let err = store
            .create_content(new_content(user_id, &[tags[0], 999]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.list_contents().await.unwrap().is_empty());

        let err = store
            .create_content(new_content(user_id, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.list_contents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_user_only_replaces_supplied_fields() {
        let (store, user_id, _) = seeded().await;
        let updated = store
            .update_user(
                user_id,
                UserPatch {
                    name: Some("Ana Maria".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.email, "ana@example.com");
        assert_eq!(updated.password_hash, "hash");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let (store, _, _) = seeded().await;
        let err = store
            .create_user(NewUser {
                name: "Other".into(),
                email: "ana@example.com".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
