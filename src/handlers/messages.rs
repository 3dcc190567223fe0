use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::SendMessageRequest;
use crate::services::MessageService;
use crate::utils::{self, parse_uuid, PaginationParams};

pub async fn send_message(
    user: AuthUser,
    body: web::Json<SendMessageRequest>,
    service: web::Data<Arc<MessageService>>,
) -> Result<HttpResponse, AppError> {
    let message = service.send(&user, body.into_inner()).await?;
    Ok(utils::response::created_response(message))
}

pub async fn conversations(
    user: AuthUser,
    service: web::Data<Arc<MessageService>>,
) -> Result<HttpResponse, AppError> {
    let conversations = service.conversations(&user).await?;
    Ok(utils::response::success_response(conversations))
}

pub async fn conversation_with(
    user: AuthUser,
    path: web::Path<String>,
    query: web::Query<PaginationParams>,
    service: web::Data<Arc<MessageService>>,
) -> Result<HttpResponse, AppError> {
    let other_id = parse_uuid(&path, "user")?;
    let page = service.conversation_with(&user, other_id, query.into_inner()).await?;
    Ok(utils::response::success_response(page))
}

pub async fn unread_count(
    user: AuthUser,
    service: web::Data<Arc<MessageService>>,
) -> Result<HttpResponse, AppError> {
    let count = service.unread_count(&user).await?;
    Ok(utils::response::success_response(serde_json::json!({ "unread": count })))
}
