use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::entities::PostStatus;
use crate::handlers::{get_tenant_id, unauthorized, upgrade_required};
use crate::models::{CreatePostRequest, PostResponse, UpdatePostRequest};
use crate::services::{PostService, TenantService};
use crate::subscription::{Resource, gate};

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub status: Option<PostStatus>,
}

#[utoipa::path(
    post,
    path = "/posts",
    tag = "posts",
    request_body = CreatePostRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Post created", body = PostResponse),
        (status = 403, description = "Monthly post limit reached"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_post(
    tenant_service: web::Data<TenantService>,
    post_service: web::Data<PostService>,
    req: HttpRequest,
    request: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    let now = Utc::now();

    let record = match tenant_service.load(&tenant_id).await {
        Ok(r) => r,
        Err(e) => return Ok(e.error_response()),
    };

    let decision = gate::check_usage(
        &record.subscription,
        &record.usage,
        Resource::PostsPerMonth,
        now,
    );
    if !decision.allowed {
        return Ok(upgrade_required(Resource::PostsPerMonth, &decision));
    }

    // scheduling additionally counts against the live scheduled-post cap
    if request.status == Some(PostStatus::Scheduled) {
        let scheduled = match tenant_service.count_scheduled_posts(&tenant_id).await {
            Ok(n) => n,
            Err(e) => return Ok(e.error_response()),
        };
        let decision = gate::check_resource_count(
            &record.subscription,
            scheduled,
            Resource::ActiveScheduledPosts,
            now,
        );
        if !decision.allowed {
            return Ok(upgrade_required(Resource::ActiveScheduledPosts, &decision));
        }
    }

    match post_service.create_post(&tenant_id, request.into_inner()).await {
        Ok(resp) => {
            if let Err(e) = tenant_service
                .record_use(&tenant_id, Resource::PostsPerMonth)
                .await
            {
                log::error!("Failed to record post usage for tenant {tenant_id}: {e}");
            }
            Ok(HttpResponse::Ok().json(json!({"success": true, "data": resp})))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/posts",
    tag = "posts",
    params(("status" = Option<String>, Query, description = "Filter by post status")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All posts for the tenant"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_posts(
    post_service: web::Data<PostService>,
    req: HttpRequest,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match post_service.list_posts(&tenant_id, query.into_inner().status).await {
        Ok(resp) => Ok(HttpResponse::Ok().json(json!({"success": true, "data": resp}))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/posts/{post_id}",
    tag = "posts",
    params(("post_id" = String, Path, description = "Post id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The post", body = PostResponse),
        (status = 404, description = "Not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_post(
    post_service: web::Data<PostService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match post_service.get_post(&tenant_id, &path.into_inner()).await {
        Ok(resp) => Ok(HttpResponse::Ok().json(json!({"success": true, "data": resp}))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/posts/{post_id}",
    tag = "posts",
    params(("post_id" = String, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated post", body = PostResponse),
        (status = 404, description = "Not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_post(
    tenant_service: web::Data<TenantService>,
    post_service: web::Data<PostService>,
    req: HttpRequest,
    path: web::Path<String>,
    request: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    let post_id = path.into_inner();
    let request = request.into_inner();

    // moving a post onto the schedule goes through the live-count gate too
    if request.status == Some(PostStatus::Scheduled) {
        let record = match tenant_service.load(&tenant_id).await {
            Ok(r) => r,
            Err(e) => return Ok(e.error_response()),
        };
        let scheduled = match tenant_service.count_scheduled_posts(&tenant_id).await {
            Ok(n) => n,
            Err(e) => return Ok(e.error_response()),
        };
        let decision = gate::check_resource_count(
            &record.subscription,
            scheduled,
            Resource::ActiveScheduledPosts,
            Utc::now(),
        );
        if !decision.allowed {
            return Ok(upgrade_required(Resource::ActiveScheduledPosts, &decision));
        }
    }

    match post_service.update_post(&tenant_id, &post_id, request).await {
        Ok(resp) => Ok(HttpResponse::Ok().json(json!({"success": true, "data": resp}))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/posts/{post_id}",
    tag = "posts",
    params(("post_id" = String, Path, description = "Post id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Post deleted"),
        (status = 404, description = "Not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn delete_post(
    post_service: web::Data<PostService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(tenant_id) = get_tenant_id(&req) else {
        return Ok(unauthorized());
    };
    match post_service.delete_post(&tenant_id, &path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({"success": true}))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn posts_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/posts")
            .route("", web::post().to(create_post))
            .route("", web::get().to(list_posts))
            .route("/{post_id}", web::get().to(get_post))
            .route("/{post_id}", web::put().to(update_post))
            .route("/{post_id}", web::delete().to(delete_post)),
    );
}
