use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{
    AddParticipantRequest, AddStageRequest, CreateSupplyChainRequest, MessageResponse, UpdateStageStatusRequest,
    UpdateSupplyChainRequest,
};
use crate::services::SupplyChainService;
use crate::utils::{self, parse_uuid};

pub async fn create_chain(
    user: AuthUser,
    body: web::Json<CreateSupplyChainRequest>,
    service: web::Data<Arc<SupplyChainService>>,
) -> Result<HttpResponse, AppError> {
    let chain = service.create_chain(&user, body.into_inner()).await?;
    Ok(utils::response::created_response(chain))
}

pub async fn list_chains(
    user: AuthUser,
    service: web::Data<Arc<SupplyChainService>>,
) -> Result<HttpResponse, AppError> {
    let chains = service.list_chains(&user).await?;
    Ok(utils::response::success_response(chains))
}

pub async fn get_chain(
    user: AuthUser,
    path: web::Path<String>,
    service: web::Data<Arc<SupplyChainService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "supply chain")?;
    let detail = service.get_chain(&user, id).await?;
    Ok(utils::response::success_response(detail))
}

pub async fn update_chain(
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateSupplyChainRequest>,
    service: web::Data<Arc<SupplyChainService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "supply chain")?;
    let chain = service.update_chain(&user, id, body.into_inner()).await?;
    Ok(utils::response::success_response(chain))
}

pub async fn archive_chain(
    user: AuthUser,
    path: web::Path<String>,
    service: web::Data<Arc<SupplyChainService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "supply chain")?;
    service.archive_chain(&user, id).await?;
    Ok(utils::response::success_response(MessageResponse::new("Supply chain archived")))
}

pub async fn add_participant(
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<AddParticipantRequest>,
    service: web::Data<Arc<SupplyChainService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "supply chain")?;
    let participant = service.add_participant(&user, id, body.into_inner()).await?;
    Ok(utils::response::created_response(participant))
}

pub async fn remove_participant(
    user: AuthUser,
    path: web::Path<(String, String)>,
    service: web::Data<Arc<SupplyChainService>>,
) -> Result<HttpResponse, AppError> {
    let (chain_id, participant_id) = path.into_inner();
    let chain_id = parse_uuid(&chain_id, "supply chain")?;
    let participant_id = parse_uuid(&participant_id, "participant")?;

    service.remove_participant(&user, chain_id, participant_id).await?;
    Ok(utils::response::success_response(MessageResponse::new("Participant removed")))
}

pub async fn add_stage(
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<AddStageRequest>,
    service: web::Data<Arc<SupplyChainService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "supply chain")?;
    let stage = service.add_stage(&user, id, body.into_inner()).await?;
    Ok(utils::response::created_response(stage))
}

pub async fn update_stage(
    user: AuthUser,
    path: web::Path<(String, String)>,
    body: web::Json<UpdateStageStatusRequest>,
    service: web::Data<Arc<SupplyChainService>>,
) -> Result<HttpResponse, AppError> {
    let (chain_id, stage_id) = path.into_inner();
    let chain_id = parse_uuid(&chain_id, "supply chain")?;
    let stage_id = parse_uuid(&stage_id, "stage")?;

    let stage = service.update_stage(&user, chain_id, stage_id, body.status).await?;
    Ok(utils::response::success_response(stage))
}
