use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{CreateListingRequest, ListingQuery, MessageResponse, UpdateListingRequest};
use crate::services::ListingService;
use crate::utils::{self, parse_uuid};

/// Public marketplace search
pub async fn search_listings(
    query: web::Query<ListingQuery>,
    service: web::Data<Arc<ListingService>>,
) -> Result<HttpResponse, AppError> {
    let page = service.search_listings(query.into_inner()).await?;
    Ok(utils::response::success_response(page))
}

pub async fn get_listing(
    path: web::Path<String>,
    service: web::Data<Arc<ListingService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "listing")?;
    let listing = service.get_listing(id).await?;
    Ok(utils::response::success_response(listing))
}

pub async fn my_listings(
    user: AuthUser,
    service: web::Data<Arc<ListingService>>,
) -> Result<HttpResponse, AppError> {
    let listings = service.my_listings(&user).await?;
    Ok(utils::response::success_response(listings))
}

pub async fn create_listing(
    user: AuthUser,
    body: web::Json<CreateListingRequest>,
    service: web::Data<Arc<ListingService>>,
) -> Result<HttpResponse, AppError> {
    let listing = service.create_listing(&user, body.into_inner()).await?;
    Ok(utils::response::created_response(listing))
}

pub async fn update_listing(
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateListingRequest>,
    service: web::Data<Arc<ListingService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "listing")?;
    let listing = service.update_listing(&user, id, body.into_inner()).await?;
    Ok(utils::response::success_response(listing))
}

pub async fn withdraw_listing(
    user: AuthUser,
    path: web::Path<String>,
    service: web::Data<Arc<ListingService>>,
) -> Result<HttpResponse, AppError> {
    let id = parse_uuid(&path, "listing")?;
    service.withdraw_listing(&user, id).await?;
    Ok(utils::response::success_response(MessageResponse::new("Listing withdrawn")))
}
