use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::DatabaseService;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateListingRequest, Listing, ListingQuery, ListingSort, ListingStatus, Paginated, UpdateListingRequest,
    UserRole,
};
use crate::utils::{SortOrder, TrimFields};

/// Marketplace listings
pub struct ListingService {
    pub db: Arc<DatabaseService>,
}

impl ListingService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn search_listings(&self, query: ListingQuery) -> AppResult<Paginated<Listing>> {
        let (sort, order) = parse_sort(query.sort_by.as_deref(), query.sort_order.as_deref())?;
        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err(AppError::bad_request("min_price must not exceed max_price"));
            }
        }

        let (items, total) = self.db.list_listings(&query, sort, order).await?;
        Ok(Paginated {
            items,
            pagination: query.pagination().meta(total),
        })
    }

    pub async fn get_listing(&self, id: Uuid) -> AppResult<Listing> {
        self.db
            .get_listing(&id)
            .await?
            .ok_or_else(|| AppError::not_found("Listing not found"))
    }

    pub async fn my_listings(&self, caller: &AuthUser) -> AppResult<Vec<Listing>> {
        self.db.list_seller_listings(&caller.id).await
    }

    pub async fn create_listing(&self, caller: &AuthUser, mut req: CreateListingRequest) -> AppResult<Listing> {
        caller.require_role(&[UserRole::Producer])?;
        req.trim_fields();
        req.validate()?;
        self.require_active_material(&req.material_id).await?;

        let id = self.db.create_listing(&caller.id, &req).await?;
        log::info!("Listing {} created by {}", id, caller.id);
        self.get_listing(id).await
    }

    pub async fn update_listing(&self, caller: &AuthUser, id: Uuid, mut req: UpdateListingRequest) -> AppResult<Listing> {
        req.trim_fields();
        req.validate()?;

        let listing = self.owned_listing(caller, id).await?;
        if listing.status == ListingStatus::Withdrawn {
            return Err(AppError::conflict("Withdrawn listings cannot be edited"));
        }
        check_quantity_change(&listing, req.quantity)?;

        let from = req.available_from.or(listing.available_from);
        let until = req.available_until.or(listing.available_until);
        if let (Some(from), Some(until)) = (from, until) {
            if until < from {
                return Err(AppError::bad_request("available_until must not be before available_from"));
            }
        }
        if let Some(material_id) = req.material_id {
            self.require_active_material(&material_id).await?;
        }

        let resizing = req.quantity.is_some();
        if !self.db.update_listing(id, req).await? {
            // Still there but missed the stock guard: reserved since it was read
            return match self.db.get_listing(&id).await? {
                Some(current) if resizing => Err(AppError::conflict(format!(
                    "Quantity cannot be reduced below the {} {} already reserved",
                    current.quantity_total - current.quantity_available,
                    current.unit
                ))),
                _ => Err(AppError::not_found("Listing not found")),
            };
        }
        self.get_listing(id).await
    }

    /// Take a listing off the market once no open deal depends on it
    pub async fn withdraw_listing(&self, caller: &AuthUser, id: Uuid) -> AppResult<()> {
        let listing = self.owned_listing(caller, id).await?;
        if listing.status == ListingStatus::Withdrawn {
            return Ok(());
        }

        if !self.db.withdraw_listing(&id).await? {
            return Err(AppError::not_found("Listing not found"));
        }
        log::info!("Listing {} withdrawn by {}", id, caller.id);
        Ok(())
    }

    async fn owned_listing(&self, caller: &AuthUser, id: Uuid) -> AppResult<Listing> {
        let listing = self.get_listing(id).await?;
        if listing.seller_id != caller.id && !caller.is_admin() {
            return Err(AppError::forbidden("You can only modify your own listings"));
        }
        Ok(listing)
    }

    async fn require_active_material(&self, material_id: &Uuid) -> AppResult<()> {
        match self.db.get_material(material_id).await? {
            Some(material) if material.is_active => Ok(()),
            _ => Err(AppError::bad_request("Unknown or inactive material")),
        }
    }
}

/// Resolve the `sort_by` and `sort_order` query parameters
pub fn parse_sort(sort_by: Option<&str>, sort_order: Option<&str>) -> AppResult<(ListingSort, SortOrder)> {
    let sort = match sort_by {
        None => ListingSort::CreatedAt,
        Some(raw) => ListingSort::from_str(raw)
            .map_err(|_| AppError::bad_request(format!("Invalid sort field '{}'", raw)))?,
    };
    Ok((sort, SortOrder::parse(sort_order)?))
}

/// A new total may not drop below what buyers have already reserved
pub fn check_quantity_change(listing: &Listing, new_total: Option<f64>) -> AppResult<()> {
    let Some(new_total) = new_total else {
        return Ok(());
    };
    let reserved = listing.quantity_total - listing.quantity_available;
    if new_total < reserved {
        return Err(AppError::conflict(format!(
            "Quantity cannot be reduced below the {} {} already reserved",
            reserved, listing.unit
        )));
    }
    Ok(())
}
