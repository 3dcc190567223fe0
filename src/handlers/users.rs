use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{ChangePasswordRequest, MessageResponse, UpdateProfileRequest, UserListQuery};
use crate::services::{SessionService, UserService};
use crate::utils::{self, parse_uuid};

/// Get own profile
pub async fn get_user_profile(
    user: AuthUser,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    let profile = user_service.get_user_profile(user.id).await?;
    Ok(utils::response::success_response(profile))
}

/// Update own profile
pub async fn update_user_profile(
    user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    let profile = user_service.update_user_profile(user.id, body.into_inner()).await?;
    Ok(utils::response::success_response(profile))
}

pub async fn change_password(
    user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    user_service.change_password(&user, body.into_inner()).await?;
    Ok(utils::response::success_response(MessageResponse::new("Password changed successfully")))
}

/// Deactivate own account
pub async fn deactivate_user(
    user: AuthUser,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    user_service.deactivate_user(user.id).await?;
    Ok(utils::response::success_response(MessageResponse::new("Account deactivated successfully")))
}

pub async fn get_public_profile(
    _user: AuthUser,
    path: web::Path<String>,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    let user_id = parse_uuid(&path, "user")?;
    let profile = user_service.get_public_profile(user_id).await?;
    Ok(utils::response::success_response(profile))
}

pub async fn get_user_sessions(
    user: AuthUser,
    session_service: web::Data<Arc<SessionService>>,
) -> Result<HttpResponse, AppError> {
    let sessions = session_service.get_user_sessions(user.id).await?;
    Ok(utils::response::success_response(sessions))
}

pub async fn end_session(
    user: AuthUser,
    path: web::Path<String>,
    session_service: web::Data<Arc<SessionService>>,
) -> Result<HttpResponse, AppError> {
    let session_id = parse_uuid(&path, "session")?;
    session_service.end_session(user.id, session_id).await?;
    Ok(utils::response::success_response(MessageResponse::new("Session ended")))
}

/// Admin: page through users
pub async fn list_users(
    user: AuthUser,
    query: web::Query<UserListQuery>,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    let page = user_service.list_users(&user, query.into_inner()).await?;
    Ok(utils::response::success_response(page))
}

pub async fn admin_activate_user(
    user: AuthUser,
    path: web::Path<String>,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    let user_id = parse_uuid(&path, "user")?;
    let profile = user_service.set_user_active(&user, user_id, true).await?;
    Ok(utils::response::success_response(profile))
}

pub async fn admin_deactivate_user(
    user: AuthUser,
    path: web::Path<String>,
    user_service: web::Data<Arc<UserService>>,
) -> Result<HttpResponse, AppError> {
    let user_id = parse_uuid(&path, "user")?;
    let profile = user_service.set_user_active(&user, user_id, false).await?;
    Ok(utils::response::success_response(profile))
}
