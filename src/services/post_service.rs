use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{PostStatus, post_entity as post};
use crate::error::{AppError, AppResult};
use crate::models::{CreatePostRequest, PostResponse, UpdatePostRequest};

#[derive(Clone)]
pub struct PostService {
    pool: DatabaseConnection,
}

impl PostService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn create_post(
        &self,
        tenant_id: &str,
        req: CreatePostRequest,
    ) -> AppResult<PostResponse> {
        if req.content.trim().is_empty() {
            return Err(AppError::ValidationError("Post content is empty".into()));
        }
        let status = req.status.unwrap_or(PostStatus::Draft);
        if status == PostStatus::Scheduled && req.scheduled_at.is_none() {
            return Err(AppError::ValidationError(
                "Scheduled posts need a scheduled_at time".into(),
            ));
        }

        let now = Utc::now();
        let model = post::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            tenant_id: Set(tenant_id.to_string()),
            content: Set(req.content),
            status: Set(status),
            scheduled_at: Set(req.scheduled_at),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        }
        .insert(&self.pool)
        .await?;

        Ok(PostResponse::from(model))
    }

    pub async fn list_posts(
        &self,
        tenant_id: &str,
        status: Option<PostStatus>,
    ) -> AppResult<Vec<PostResponse>> {
        let mut query = post::Entity::find().filter(post::Column::TenantId.eq(tenant_id));
        if let Some(status) = status {
            query = query.filter(post::Column::Status.eq(status));
        }
        let posts = query
            .order_by_desc(post::Column::CreatedAt)
            .all(&self.pool)
            .await?;
        Ok(posts.into_iter().map(PostResponse::from).collect())
    }

    pub async fn get_post(&self, tenant_id: &str, post_id: &str) -> AppResult<PostResponse> {
        let model = self.find_owned(tenant_id, post_id).await?;
        Ok(PostResponse::from(model))
    }

    pub async fn update_post(
        &self,
        tenant_id: &str,
        post_id: &str,
        req: UpdatePostRequest,
    ) -> AppResult<PostResponse> {
        let model = self.find_owned(tenant_id, post_id).await?;
        let mut am = model.into_active_model();
        if let Some(content) = req.content {
            am.content = Set(content);
        }
        if let Some(status) = req.status {
            am.status = Set(status);
        }
        if let Some(scheduled_at) = req.scheduled_at {
            am.scheduled_at = Set(Some(scheduled_at));
        }
        am.updated_at = Set(Some(Utc::now()));
        let updated = am.update(&self.pool).await?;
        Ok(PostResponse::from(updated))
    }

    pub async fn delete_post(&self, tenant_id: &str, post_id: &str) -> AppResult<()> {
        let model = self.find_owned(tenant_id, post_id).await?;
        model.delete(&self.pool).await?;
        Ok(())
    }

    async fn find_owned(&self, tenant_id: &str, post_id: &str) -> AppResult<post::Model> {
        post::Entity::find_by_id(post_id.to_string())
            .filter(post::Column::TenantId.eq(tenant_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".into()))
    }
}
