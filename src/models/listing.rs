use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::utils::{trim_in_place, trim_opt_in_place, PaginationParams, TrimFields};

text_enum! {
    ListingStatus {
        Active => "active",
        Sold => "sold",
        Withdrawn => "withdrawn",
    }
}

text_enum! {
    /// Columns a listing search may be ordered by
    ListingSort {
        CreatedAt => "created_at",
        Price => "price",
        Quantity => "quantity",
    }
}

impl ListingSort {
    pub fn column(&self) -> &'static str {
        match self {
            ListingSort::CreatedAt => "l.created_at",
            ListingSort::Price => "l.price_per_unit",
            ListingSort::Quantity => "l.quantity_available",
        }
    }
}

/// A quantity of waste material offered for sale
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub seller_username: String,
    pub material_id: Uuid,
    pub material_name: String,
    pub category_id: Uuid,
    pub category_name: String,
    pub title: String,
    pub description: Option<String>,
    pub quantity_total: f64,
    pub quantity_available: f64,
    pub unit: String,
    pub price_per_unit: f64,
    pub currency: String,
    pub location: String,
    pub available_from: Option<NaiveDate>,
    pub available_until: Option<NaiveDate>,
    pub status: ListingStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row-locked view of a listing used while reserving stock for a purchase
#[derive(Debug, Clone)]
pub struct ListingStock {
    pub seller_id: Uuid,
    pub quantity_available: f64,
    pub unit: String,
    pub price_per_unit: f64,
    pub currency: String,
    pub status: ListingStatus,
    pub is_active: bool,
}

impl ListingStock {
    /// Whether `buyer_id` may take `quantity` from this listing right now
    pub fn check_purchase(&self, buyer_id: Uuid, quantity: f64) -> AppResult<()> {
        if self.seller_id == buyer_id {
            return Err(AppError::bad_request("You cannot buy your own listing"));
        }
        if !self.is_active || self.status != ListingStatus::Active {
            return Err(AppError::conflict("Listing is not available"));
        }
        if quantity > self.quantity_available {
            return Err(AppError::conflict(format!(
                "Only {} {} available",
                self.quantity_available, self.unit
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_create_window", skip_on_field_errors = false))]
pub struct CreateListingRequest {
    pub material_id: Uuid,

    #[validate(length(min = 3, max = 200, message = "Title must be 3-200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[validate(custom = "crate::utils::validate_positive_quantity")]
    pub quantity: f64,

    #[validate(length(min = 1, max = 20, message = "Unit must be 1-20 characters"))]
    pub unit: String,

    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price_per_unit: f64,

    #[validate(custom = "crate::utils::validate_currency")]
    pub currency: Option<String>,

    #[validate(length(min = 2, max = 200, message = "Location must be 2-200 characters"))]
    pub location: String,

    pub available_from: Option<NaiveDate>,
    pub available_until: Option<NaiveDate>,
}

impl TrimFields for CreateListingRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.title);
        trim_in_place(&mut self.location);
    }
}

fn validate_create_window(req: &CreateListingRequest) -> Result<(), ValidationError> {
    check_availability_window(req.available_from, req.available_until)
}

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_update_window", skip_on_field_errors = false))]
pub struct UpdateListingRequest {
    pub material_id: Option<Uuid>,

    #[validate(length(min = 3, max = 200, message = "Title must be 3-200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[validate(custom = "crate::utils::validate_positive_quantity")]
    pub quantity: Option<f64>,

    #[validate(length(min = 1, max = 20, message = "Unit must be 1-20 characters"))]
    pub unit: Option<String>,

    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price_per_unit: Option<f64>,

    #[validate(custom = "crate::utils::validate_currency")]
    pub currency: Option<String>,

    #[validate(length(min = 2, max = 200, message = "Location must be 2-200 characters"))]
    pub location: Option<String>,

    pub available_from: Option<NaiveDate>,
    pub available_until: Option<NaiveDate>,
}

impl TrimFields for UpdateListingRequest {
    fn trim_fields(&mut self) {
        trim_opt_in_place(&mut self.title);
        trim_opt_in_place(&mut self.location);
    }
}

fn validate_update_window(req: &UpdateListingRequest) -> Result<(), ValidationError> {
    check_availability_window(req.available_from, req.available_until)
}

fn check_availability_window(
    from: Option<NaiveDate>,
    until: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    match (from, until) {
        (Some(from), Some(until)) if until < from => {
            let mut err = ValidationError::new("availability_window");
            err.message = Some("available_until must not be before available_from".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub material_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub status: Option<ListingStatus>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_quantity: Option<f64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListingQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams { page: self.page, limit: self.limit }
    }
}
