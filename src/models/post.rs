use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{PostStatus, post_entity as post};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub status: Option<PostStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostResponse {
    pub id: String,
    pub content: String,
    pub status: PostStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<post::Model> for PostResponse {
    fn from(m: post::Model) -> Self {
        Self {
            id: m.id,
            content: m.content,
            status: m.status,
            scheduled_at: m.scheduled_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
