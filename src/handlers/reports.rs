use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::services::ReportService;
use crate::utils;

pub async fn summary(user: AuthUser, service: web::Data<Arc<ReportService>>) -> Result<HttpResponse, AppError> {
    let summary = service.summary(&user).await?;
    Ok(utils::response::success_response(summary))
}

/// Admin: marketplace-wide figures
pub async fn marketplace(user: AuthUser, service: web::Data<Arc<ReportService>>) -> Result<HttpResponse, AppError> {
    let report = service.marketplace(&user).await?;
    Ok(utils::response::success_response(report))
}
