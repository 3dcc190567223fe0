use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{
    CreateCategoryRequest, CreateMaterialRequest, MaterialQuery, MessageResponse, UpdateMaterialRequest,
};
use crate::services::MaterialService;
use crate::utils::{self, parse_uuid};

pub async fn list_categories(service: web::Data<Arc<MaterialService>>) -> Result<HttpResponse, AppError> {
    let categories = service.list_categories().await?;
    Ok(utils::response::success_response(categories))
}

pub async fn create_category(
    user: AuthUser,
    body: web::Json<CreateCategoryRequest>,
    service: web::Data<Arc<MaterialService>>,
) -> Result<HttpResponse, AppError> {
    let category = service.create_category(&user, body.into_inner()).await?;
    Ok(utils::response::created_response(category))
}

pub async fn list_materials(
    query: web::Query<MaterialQuery>,
    service: web::Data<Arc<MaterialService>>,
) -> Result<HttpResponse, AppError> {
    let materials = service.list_materials(query.into_inner()).await?;
    Ok(utils::response::success_response(materials))
}

pub async fn get_material(
    path: web::Path<String>,
    service: web::Data<Arc<MaterialService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "material")?;
    let material = service.get_material(id).await?;
    Ok(utils::response::success_response(material))
}

pub async fn create_material(
    user: AuthUser,
    body: web::Json<CreateMaterialRequest>,
    service: web::Data<Arc<MaterialService>>,
) -> Result<HttpResponse, AppError> {
    let material = service.create_material(&user, body.into_inner()).await?;
    Ok(utils::response::created_response(material))
}

pub async fn update_material(
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateMaterialRequest>,
    service: web::Data<Arc<MaterialService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "material")?;
    let material = service.update_material(&user, id, body.into_inner()).await?;
    Ok(utils::response::success_response(material))
}

pub async fn delete_material(
    user: AuthUser,
    path: web::Path<String>,
    service: web::Data<Arc<MaterialService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "material")?;
    service.delete_material(&user, id).await?;
    Ok(utils::response::success_response(MessageResponse::new("Material deactivated")))
}
