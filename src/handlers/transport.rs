use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{CreateTransportRequest, UpdateTransportStatusRequest};
use crate::services::TransportService;
use crate::utils::{self, parse_uuid};

pub async fn create_request(
    user: AuthUser,
    body: web::Json<CreateTransportRequest>,
    service: web::Data<Arc<TransportService>>,
) -> Result<HttpResponse, AppError> {
    let request = service.create_request(&user, body.into_inner()).await?;
    Ok(utils::response::created_response(request))
}

pub async fn list_requests(
    user: AuthUser,
    service: web::Data<Arc<TransportService>>,
) -> Result<HttpResponse, AppError> {
    let requests = service.list_requests(&user).await?;
    Ok(utils::response::success_response(requests))
}

pub async fn get_request(
    user: AuthUser,
    path: web::Path<String>,
    service: web::Data<Arc<TransportService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "transport request")?;
    let request = service.get_request(&user, id).await?;
    Ok(utils::response::success_response(request))
}

pub async fn assign(
    user: AuthUser,
    path: web::Path<String>,
    service: web::Data<Arc<TransportService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "transport request")?;
    let request = service.assign(&user, id).await?;
    Ok(utils::response::success_response(request))
}

pub async fn update_status(
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateTransportStatusRequest>,
    service: web::Data<Arc<TransportService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "transport request")?;
    let request = service.update_status(&user, id, body.status).await?;
    Ok(utils::response::success_response(request))
}
