use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TagNameRequest {
    pub name: String,
}

/// Body for `POST /api/tags/link` and `DELETE /api/tags/unlink`.
#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub content_id: i64,
    pub tag_id: i64,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub message: &'static str,
}
