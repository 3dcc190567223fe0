use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{CreateTransactionRequest, TransactionQuery, UpdateTransactionStatusRequest};
use crate::services::TransactionService;
use crate::utils::{self, parse_uuid};

pub async fn create_transaction(
    user: AuthUser,
    body: web::Json<CreateTransactionRequest>,
    service: web::Data<Arc<TransactionService>>,
) -> Result<HttpResponse, AppError> {
    let transaction = service.create_transaction(&user, body.into_inner()).await?;
    Ok(utils::response::created_response(transaction))
}

pub async fn list_transactions(
    user: AuthUser,
    query: web::Query<TransactionQuery>,
    service: web::Data<Arc<TransactionService>>,
) -> Result<HttpResponse, AppError> {
    let page = service.list_transactions(&user, query.into_inner()).await?;
    Ok(utils::response::success_response(page))
}

pub async fn get_transaction(
    user: AuthUser,
    path: web::Path<String>,
    service: web::Data<Arc<TransactionService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "transaction")?;
    let transaction = service.get_transaction(&user, id).await?;
    Ok(utils::response::success_response(transaction))
}

pub async fn update_status(
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateTransactionStatusRequest>,
    service: web::Data<Arc<TransactionService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "transaction")?;
    let transaction = service.update_status(&user, id, body.status).await?;
    Ok(utils::response::success_response(transaction))
}
