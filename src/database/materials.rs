use tokio_postgres::Row;
use uuid::Uuid;

use super::{DatabaseService, SqlParams, UpdateBuilder, WhereClause};
use crate::error::AppResult;
use crate::models::{
    CreateCategoryRequest, CreateMaterialRequest, Material, MaterialCategory, MaterialQuery,
    UpdateMaterialRequest,
};
use crate::utils::{like_pattern, non_blank};

const MATERIAL_SELECT: &str = "SELECT m.id, m.category_id, c.name AS category_name, m.name, m.description, \
     m.default_unit, m.is_hazardous, m.is_active, m.created_at, m.updated_at \
     FROM materials m JOIN material_categories c ON c.id = m.category_id";

impl DatabaseService {
    /// All categories with the number of active materials in each
    pub async fn list_categories(&self) -> AppResult<Vec<MaterialCategory>> {
        let client = self.get_client().await?;

        let rows = client
            .query(
                "SELECT c.id, c.name, c.description, c.created_at,
                        COUNT(m.id) FILTER (WHERE m.is_active) AS material_count
                 FROM material_categories c
                 LEFT JOIN materials m ON m.category_id = c.id
                 GROUP BY c.id
                 ORDER BY c.name",
                &[],
            )
            .await?;

        Ok(rows.iter().map(Self::row_to_category).collect())
    }

    pub async fn create_category(&self, req: &CreateCategoryRequest) -> AppResult<MaterialCategory> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                "INSERT INTO material_categories (name, description) VALUES ($1, $2)
                 RETURNING id, name, description, created_at, 0::BIGINT AS material_count",
                &[&req.name, &req.description],
            )
            .await?;

        Ok(Self::row_to_category(&row))
    }

    pub async fn list_materials(&self, query: &MaterialQuery) -> AppResult<Vec<Material>> {
        let mut params = SqlParams::new();
        let mut filter = WhereClause::new();
        filter.push("m.is_active = true");

        if let Some(category_id) = query.category_id {
            let p = params.push(category_id);
            filter.push(format!("m.category_id = {}", p));
        }
        if let Some(search) = non_blank(query.search.as_deref()) {
            let p = params.push(like_pattern(&search));
            filter.push(format!("(m.name ILIKE {p} OR m.description ILIKE {p})"));
        }

        let sql = format!("{}{} ORDER BY c.name, m.name", MATERIAL_SELECT, filter.to_sql());
        let rows = self.query_dynamic(&sql, &params).await?;

        Ok(rows.iter().map(Self::row_to_material).collect())
    }

    /// Fetch a material regardless of its active flag
    pub async fn get_material(&self, id: &Uuid) -> AppResult<Option<Material>> {
        let client = self.get_client().await?;

        let sql = format!("{} WHERE m.id = $1", MATERIAL_SELECT);
        Ok(client
            .query_opt(sql.as_str(), &[id])
            .await?
            .map(|row| Self::row_to_material(&row)))
    }

    pub async fn create_material(&self, req: &CreateMaterialRequest) -> AppResult<Uuid> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                "INSERT INTO materials (category_id, name, description, default_unit, is_hazardous)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id",
                &[
                    &req.category_id,
                    &req.name,
                    &req.description,
                    &req.default_unit,
                    &req.is_hazardous.unwrap_or(false),
                ],
            )
            .await?;

        Ok(row.get(0))
    }

    /// Returns false when the material does not exist
    pub async fn update_material(&self, id: Uuid, req: UpdateMaterialRequest) -> AppResult<bool> {
        let mut update = UpdateBuilder::new("materials");
        update
            .set("category_id", req.category_id)
            .set("name", req.name)
            .set("description", req.description)
            .set("default_unit", req.default_unit)
            .set("is_hazardous", req.is_hazardous)
            .touch("updated_at = NOW()");

        if !update.has_changes() {
            return Ok(self.get_material(&id).await?.is_some());
        }

        let (sql, params) = update.build(id, Some("id"));
        Ok(self.query_opt_dynamic(&sql, &params).await?.is_some())
    }

    /// Soft delete. Returns false when the material does not exist.
    pub async fn deactivate_material(&self, id: &Uuid) -> AppResult<bool> {
        let client = self.get_client().await?;

        let updated = client
            .execute(
                "UPDATE materials SET is_active = false, updated_at = NOW() WHERE id = $1",
                &[id],
            )
            .await?;

        Ok(updated > 0)
    }

    fn row_to_category(row: &Row) -> MaterialCategory {
        MaterialCategory {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            material_count: row.get("material_count"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_material(row: &Row) -> Material {
        Material {
            id: row.get("id"),
            category_id: row.get("category_id"),
            category_name: row.get("category_name"),
            name: row.get("name"),
            description: row.get("description"),
            default_unit: row.get("default_unit"),
            is_hazardous: row.get("is_hazardous"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
