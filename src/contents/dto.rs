use serde::Deserialize;

/// Body for `POST /api/contents`. `tagIds` must be non-empty; a missing
/// field deserializes to an empty list and is rejected downstream.
#[derive(Debug, Deserialize)]
pub struct CreateContentRequest {
    pub user_id: i64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "texto", default)]
    pub body: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "tagIds", default)]
    pub tag_ids: Vec<i64>,
}

/// Body for `PUT /api/contents/:id`. Absent fields stay unchanged; a present
/// `tagIds` replaces the whole tag set.
#[derive(Debug, Deserialize)]
pub struct UpdateContentRequest {
    #[serde(rename = "titulo", default)]
    pub title: Option<String>,
    #[serde(rename = "texto", default)]
    pub body: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "tagIds", default)]
    pub tag_ids: Option<Vec<i64>>,
}
