use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;

use super::client_info;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{LoginRequest, MessageResponse, RefreshRequest, RegisterRequest};
use crate::services::UserService;
use crate::utils;

/// Register user endpoint
pub async fn register_user(
    req: HttpRequest,
    body: web::Json<RegisterRequest>,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    let response = user_service
        .register_user(body.into_inner(), client_info(&req))
        .await?;
    Ok(utils::response::created_response(response))
}

/// Login user endpoint
pub async fn login_user(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    let response = user_service.login_user(body.into_inner(), client_info(&req)).await?;
    Ok(utils::response::success_response(response))
}

/// Refresh token endpoint
pub async fn refresh_token(
    req: HttpRequest,
    body: web::Json<RefreshRequest>,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    let token = body.refresh_token.trim();
    if token.is_empty() {
        return Err(AppError::bad_request("Refresh token is required"));
    }

    let response = user_service.refresh_token(token, client_info(&req)).await?;
    Ok(utils::response::success_response(response))
}

/// Logout user endpoint
pub async fn logout_user(
    user: AuthUser,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    user_service.logout_user(&user.claims).await?;
    Ok(utils::response::success_response(MessageResponse::new("Logged out successfully")))
}
