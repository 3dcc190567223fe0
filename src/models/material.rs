use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::utils::{trim_in_place, trim_opt_in_place, TrimFields};

/// Grouping of materials, e.g. "Crop residues" or "Animal manure"
#[derive(Debug, Clone, Serialize)]
pub struct MaterialCategory {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub material_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A tradeable waste material
#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub id: Uuid,
    pub category_id: Uuid,
    pub category_name: String,
    pub name: String,
    pub description: Option<String>,
    pub default_unit: String,
    pub is_hazardous: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 2, max = 100, message = "Category name must be 2-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
}

impl TrimFields for CreateCategoryRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.name);
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateMaterialRequest {
    pub category_id: Uuid,

    #[validate(length(min = 2, max = 100, message = "Material name must be 2-100 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 20, message = "Unit must be 1-20 characters"))]
    pub default_unit: String,

    pub is_hazardous: Option<bool>,
}

impl TrimFields for CreateMaterialRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.name);
        trim_in_place(&mut self.default_unit);
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMaterialRequest {
    pub category_id: Option<Uuid>,

    #[validate(length(min = 2, max = 100, message = "Material name must be 2-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 20, message = "Unit must be 1-20 characters"))]
    pub default_unit: Option<String>,

    pub is_hazardous: Option<bool>,
}

impl TrimFields for UpdateMaterialRequest {
    fn trim_fields(&mut self) {
        trim_opt_in_place(&mut self.name);
        trim_opt_in_place(&mut self.default_unit);
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MaterialQuery {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}
