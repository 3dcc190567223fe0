use serde::Serialize;
use uuid::Uuid;

/// A label with the number of rows carrying it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

/// Activity summary for the calling user
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub listings_by_status: Vec<LabelCount>,
    pub active_listing_volume: f64,
    pub sales_by_status: Vec<LabelCount>,
    pub purchases_by_status: Vec<LabelCount>,
    pub sales_revenue: f64,
    pub purchase_spend: f64,
}

#[derive(Debug, Serialize)]
pub struct CategoryVolume {
    pub category_id: Uuid,
    pub category_name: String,
    pub active_listings: i64,
    pub available_volume: f64,
}

#[derive(Debug, Serialize)]
pub struct MaterialVolume {
    pub material_id: Uuid,
    pub material_name: String,
    pub completed_volume: f64,
}

/// Marketplace-wide figures for administrators
#[derive(Debug, Serialize)]
pub struct MarketplaceReport {
    pub users_by_role: Vec<LabelCount>,
    pub categories: Vec<CategoryVolume>,
    pub completed_transactions: i64,
    pub completed_value: f64,
    pub top_materials: Vec<MaterialVolume>,
}
