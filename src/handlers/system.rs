use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::database::DatabaseService;
use crate::error::AppError;
use crate::utils;

/// Health check endpoint
pub async fn health_check() -> Result<HttpResponse, AppError> {
    Ok(utils::response::success_response(serde_json::json!({ "status": "healthy" })))
}

/// Server status endpoint
pub async fn server_status(db: web::Data<Arc<DatabaseService>>) -> Result<HttpResponse, AppError> {
    let database = if db.ping().await { "connected" } else { "unreachable" };

    let status = serde_json::json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "database": database,
    });
    Ok(utils::response::success_response(status))
}
