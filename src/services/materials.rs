use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::DatabaseService;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateCategoryRequest, CreateMaterialRequest, Material, MaterialCategory, MaterialQuery, UpdateMaterialRequest,
};
use crate::utils::TrimFields;

/// Catalogue of waste categories and materials
pub struct MaterialService {
    pub db: Arc<DatabaseService>,
}

impl MaterialService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn list_categories(&self) -> AppResult<Vec<MaterialCategory>> {
        self.db.list_categories().await
    }

    pub async fn create_category(&self, caller: &AuthUser, mut req: CreateCategoryRequest) -> AppResult<MaterialCategory> {
        caller.require_admin()?;
        req.trim_fields();
        req.validate()?;
        self.db.create_category(&req).await
    }

    pub async fn list_materials(&self, query: MaterialQuery) -> AppResult<Vec<Material>> {
        self.db.list_materials(&query).await
    }

    pub async fn get_material(&self, id: Uuid) -> AppResult<Material> {
        self.db
            .get_material(&id)
            .await?
            .ok_or_else(|| AppError::not_found("Material not found"))
    }

    pub async fn create_material(&self, caller: &AuthUser, mut req: CreateMaterialRequest) -> AppResult<Material> {
        caller.require_admin()?;
        req.trim_fields();
        req.validate()?;

        let id = self.db.create_material(&req).await?;
        log::info!("Material {} created by {}", id, caller.id);
        self.get_material(id).await
    }

    pub async fn update_material(
        &self,
        caller: &AuthUser,
        id: Uuid,
        mut req: UpdateMaterialRequest,
    ) -> AppResult<Material> {
        caller.require_admin()?;
        req.trim_fields();
        req.validate()?;

        if !self.db.update_material(id, req).await? {
            return Err(AppError::not_found("Material not found"));
        }
        self.get_material(id).await
    }

    /// Soft delete; existing listings keep referring to the material
    pub async fn delete_material(&self, caller: &AuthUser, id: Uuid) -> AppResult<()> {
        caller.require_admin()?;

        if !self.db.deactivate_material(&id).await? {
            return Err(AppError::not_found("Material not found"));
        }
        log::info!("Material {} deactivated by {}", id, caller.id);
        Ok(())
    }
}
