use tokio_postgres::Row;
use uuid::Uuid;

use super::{enum_column, DatabaseService, UpdateBuilder};
use crate::error::AppResult;
use crate::models::{
    AddParticipantRequest, AddStageRequest, CreateSupplyChainRequest, Participant, Stage, StageStatus,
    SupplyChain, SupplyChainStatus, UpdateSupplyChainRequest,
};

const CHAIN_COLUMNS: &str = "id, owner_id, name, description, status, created_at, updated_at";
const PARTICIPANT_COLUMNS: &str = "id, supply_chain_id, company_name, role, user_id, created_at";
const STAGE_COLUMNS: &str =
    "id, supply_chain_id, position, name, location, material_id, status, created_at, updated_at";

impl DatabaseService {
    pub async fn create_supply_chain(&self, owner_id: &Uuid, req: &CreateSupplyChainRequest) -> AppResult<SupplyChain> {
        let client = self.get_client().await?;

        let sql = format!(
            "INSERT INTO supply_chains (owner_id, name, description) VALUES ($1, $2, $3) RETURNING {}",
            CHAIN_COLUMNS
        );
        let row = client
            .query_one(sql.as_str(), &[owner_id, &req.name, &req.description])
            .await?;

        Self::row_to_chain(&row)
    }

    /// Chains a user owns or takes part in
    pub async fn list_user_supply_chains(&self, user_id: &Uuid) -> AppResult<Vec<SupplyChain>> {
        let client = self.get_client().await?;

        let sql = format!(
            "SELECT {} FROM supply_chains sc
             WHERE sc.owner_id = $1
                OR EXISTS (SELECT 1 FROM supply_chain_participants p
                           WHERE p.supply_chain_id = sc.id AND p.user_id = $1)
             ORDER BY sc.updated_at DESC",
            CHAIN_COLUMNS
        );
        client
            .query(sql.as_str(), &[user_id])
            .await?
            .iter()
            .map(Self::row_to_chain)
            .collect()
    }

    pub async fn get_supply_chain(&self, id: &Uuid) -> AppResult<Option<SupplyChain>> {
        let client = self.get_client().await?;

        let sql = format!("SELECT {} FROM supply_chains WHERE id = $1", CHAIN_COLUMNS);
        client
            .query_opt(sql.as_str(), &[id])
            .await?
            .map(|row| Self::row_to_chain(&row))
            .transpose()
    }

    /// Whether a user is listed as a participant of a chain
    pub async fn is_supply_chain_participant(&self, chain_id: &Uuid, user_id: &Uuid) -> AppResult<bool> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM supply_chain_participants
                                WHERE supply_chain_id = $1 AND user_id = $2)",
                &[chain_id, user_id],
            )
            .await?;

        Ok(row.get(0))
    }

    pub async fn update_supply_chain(
        &self,
        id: Uuid,
        req: UpdateSupplyChainRequest,
    ) -> AppResult<Option<SupplyChain>> {
        let mut update = UpdateBuilder::new("supply_chains");
        update
            .set("name", req.name)
            .set("description", req.description)
            .set("status", req.status.map(|s| s.as_str().to_string()))
            .touch("updated_at = NOW()");

        if !update.has_changes() {
            return self.get_supply_chain(&id).await;
        }

        let (sql, params) = update.build(id, Some(CHAIN_COLUMNS));
        self.query_opt_dynamic(&sql, &params)
            .await?
            .map(|row| Self::row_to_chain(&row))
            .transpose()
    }

    pub async fn set_supply_chain_status(&self, id: &Uuid, status: SupplyChainStatus) -> AppResult<bool> {
        let client = self.get_client().await?;

        let updated = client
            .execute(
                "UPDATE supply_chains SET status = $2, updated_at = NOW() WHERE id = $1",
                &[id, &status.as_str()],
            )
            .await?;

        Ok(updated > 0)
    }

    pub async fn get_participants(&self, chain_id: &Uuid) -> AppResult<Vec<Participant>> {
        let client = self.get_client().await?;

        let sql = format!(
            "SELECT {} FROM supply_chain_participants WHERE supply_chain_id = $1 ORDER BY created_at",
            PARTICIPANT_COLUMNS
        );
        let rows = client.query(sql.as_str(), &[chain_id]).await?;

        Ok(rows.iter().map(Self::row_to_participant).collect())
    }

    pub async fn add_participant(&self, chain_id: &Uuid, req: &AddParticipantRequest) -> AppResult<Participant> {
        let client = self.get_client().await?;

        let sql = format!(
            "INSERT INTO supply_chain_participants (supply_chain_id, company_name, role, user_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            PARTICIPANT_COLUMNS
        );
        let row = client
            .query_one(
                sql.as_str(),
                &[chain_id, &req.company_name, &req.role, &req.user_id],
            )
            .await?;

        Ok(Self::row_to_participant(&row))
    }

    pub async fn remove_participant(&self, chain_id: &Uuid, participant_id: &Uuid) -> AppResult<bool> {
        let client = self.get_client().await?;

        let deleted = client
            .execute(
                "DELETE FROM supply_chain_participants WHERE id = $1 AND supply_chain_id = $2",
                &[participant_id, chain_id],
            )
            .await?;

        Ok(deleted > 0)
    }

    /// Stages in flow order
    pub async fn get_stages(&self, chain_id: &Uuid) -> AppResult<Vec<Stage>> {
        let client = self.get_client().await?;

        let sql = format!(
            "SELECT {} FROM supply_chain_stages WHERE supply_chain_id = $1 ORDER BY position",
            STAGE_COLUMNS
        );
        client
            .query(sql.as_str(), &[chain_id])
            .await?
            .iter()
            .map(Self::row_to_stage)
            .collect()
    }

    pub async fn get_stage(&self, chain_id: &Uuid, stage_id: &Uuid) -> AppResult<Option<Stage>> {
        let client = self.get_client().await?;

        let sql = format!(
            "SELECT {} FROM supply_chain_stages WHERE id = $1 AND supply_chain_id = $2",
            STAGE_COLUMNS
        );
        client
            .query_opt(sql.as_str(), &[stage_id, chain_id])
            .await?
            .map(|row| Self::row_to_stage(&row))
            .transpose()
    }

    /// Append a stage after the current last one
    pub async fn add_stage(&self, chain_id: &Uuid, req: &AddStageRequest) -> AppResult<Stage> {
        let client = self.get_client().await?;

        let sql = format!(
            "INSERT INTO supply_chain_stages (supply_chain_id, position, name, location, material_id)
             SELECT $1, COALESCE(MAX(position), 0) + 1, $2, $3, $4
             FROM supply_chain_stages WHERE supply_chain_id = $1
             RETURNING {}",
            STAGE_COLUMNS
        );
        let row = client
            .query_one(
                sql.as_str(),
                &[chain_id, &req.name, &req.location, &req.material_id],
            )
            .await?;

        Self::row_to_stage(&row)
    }

    /// Move a stage from `from` to `to` and roll the chain status forward:
    /// starting a stage activates a planning chain, finishing the last open
    /// stage completes an active one.
    ///
    /// Returns false if the stage was no longer in `from`.
    pub async fn update_stage_status(
        &self,
        chain_id: &Uuid,
        stage_id: &Uuid,
        from: StageStatus,
        to: StageStatus,
    ) -> AppResult<bool> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let updated = tx
            .execute(
                "UPDATE supply_chain_stages SET status = $4, updated_at = NOW()
                 WHERE id = $1 AND supply_chain_id = $2 AND status = $3",
                &[stage_id, chain_id, &from.as_str(), &to.as_str()],
            )
            .await?;
        if updated == 0 {
            return Ok(false);
        }

        match to {
            StageStatus::InProgress => {
                tx.execute(
                    "UPDATE supply_chains SET status = 'active', updated_at = NOW()
                     WHERE id = $1 AND status = 'planning'",
                    &[chain_id],
                )
                .await?;
            }
            StageStatus::Completed => {
                tx.execute(
                    "UPDATE supply_chains SET status = 'completed', updated_at = NOW()
                     WHERE id = $1 AND status = 'active'
                       AND NOT EXISTS (SELECT 1 FROM supply_chain_stages
                                       WHERE supply_chain_id = $1 AND status <> 'completed')",
                    &[chain_id],
                )
                .await?;
            }
            StageStatus::Pending => {}
        }

        tx.commit().await?;
        Ok(true)
    }

    fn row_to_chain(row: &Row) -> AppResult<SupplyChain> {
        Ok(SupplyChain {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            name: row.get("name"),
            description: row.get("description"),
            status: enum_column(row, "status")?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_participant(row: &Row) -> Participant {
        Participant {
            id: row.get("id"),
            supply_chain_id: row.get("supply_chain_id"),
            company_name: row.get("company_name"),
            role: row.get("role"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_stage(row: &Row) -> AppResult<Stage> {
        Ok(Stage {
            id: row.get("id"),
            supply_chain_id: row.get("supply_chain_id"),
            position: row.get("position"),
            name: row.get("name"),
            location: row.get("location"),
            material_id: row.get("material_id"),
            status: enum_column(row, "status")?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
