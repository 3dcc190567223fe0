use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::DatabaseService;
use crate::error::{AppError, AppResult};
use crate::models::{
    AddParticipantRequest, AddStageRequest, CreateSupplyChainRequest, Participant, Stage, StageStatus, SupplyChain,
    SupplyChainDetail, SupplyChainStatus, UpdateSupplyChainRequest,
};
use crate::utils::TrimFields;

/// Stages only ever move one step forward
pub fn check_stage_transition(current: StageStatus, next: StageStatus) -> AppResult<()> {
    if current.next() == Some(next) {
        Ok(())
    } else {
        Err(AppError::conflict(format!("Cannot move a {} stage to {}", current, next)))
    }
}

/// Status changes an owner may make through an update. Archiving has its
/// own endpoint and archived chains never come back.
pub fn check_chain_transition(current: SupplyChainStatus, next: SupplyChainStatus) -> AppResult<()> {
    use SupplyChainStatus::*;

    match (current, next) {
        (from, to) if from == to && from != Archived => Ok(()),
        (Planning, Active) | (Active, Completed) => Ok(()),
        (from, to) => Err(AppError::conflict(format!("Cannot move a {} supply chain to {}", from, to))),
    }
}

/// Supply chain tracking
pub struct SupplyChainService {
    pub db: Arc<DatabaseService>,
}

impl SupplyChainService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn create_chain(&self, caller: &AuthUser, mut req: CreateSupplyChainRequest) -> AppResult<SupplyChain> {
        req.trim_fields();
        req.validate()?;
        let chain = self.db.create_supply_chain(&caller.id, &req).await?;
        log::info!("Supply chain {} created by {}", chain.id, caller.id);
        Ok(chain)
    }

    pub async fn list_chains(&self, caller: &AuthUser) -> AppResult<Vec<SupplyChain>> {
        self.db.list_user_supply_chains(&caller.id).await
    }

    /// Chain with participants and ordered stages; visible to its owner,
    /// its participants and admins
    pub async fn get_chain(&self, caller: &AuthUser, id: Uuid) -> AppResult<SupplyChainDetail> {
        let chain = self.fetch(id).await?;
        if chain.owner_id != caller.id
            && !caller.is_admin()
            && !self.db.is_supply_chain_participant(&id, &caller.id).await?
        {
            return Err(AppError::forbidden("You do not have access to this supply chain"));
        }

        let participants = self.db.get_participants(&id).await?;
        let stages = self.db.get_stages(&id).await?;
        Ok(SupplyChainDetail { chain, participants, stages })
    }

    pub async fn update_chain(
        &self,
        caller: &AuthUser,
        id: Uuid,
        mut req: UpdateSupplyChainRequest,
    ) -> AppResult<SupplyChain> {
        req.trim_fields();
        req.validate()?;
        let chain = self.owned_chain(caller, id).await?;
        reject_archived(&chain)?;
        if let Some(next) = req.status {
            check_chain_transition(chain.status, next)?;
        }

        self.db
            .update_supply_chain(id, req)
            .await?
            .ok_or_else(|| AppError::not_found("Supply chain not found"))
    }

    pub async fn archive_chain(&self, caller: &AuthUser, id: Uuid) -> AppResult<()> {
        self.owned_chain(caller, id).await?;
        self.db.set_supply_chain_status(&id, SupplyChainStatus::Archived).await?;
        log::info!("Supply chain {} archived by {}", id, caller.id);
        Ok(())
    }

    pub async fn add_participant(
        &self,
        caller: &AuthUser,
        id: Uuid,
        mut req: AddParticipantRequest,
    ) -> AppResult<Participant> {
        req.trim_fields();
        req.validate()?;
        let chain = self.owned_chain(caller, id).await?;
        reject_archived(&chain)?;

        self.db.add_participant(&id, &req).await
    }

    pub async fn remove_participant(&self, caller: &AuthUser, id: Uuid, participant_id: Uuid) -> AppResult<()> {
        let chain = self.owned_chain(caller, id).await?;
        reject_archived(&chain)?;

        if !self.db.remove_participant(&id, &participant_id).await? {
            return Err(AppError::not_found("Participant not found"));
        }
        Ok(())
    }

    pub async fn add_stage(&self, caller: &AuthUser, id: Uuid, mut req: AddStageRequest) -> AppResult<Stage> {
        req.trim_fields();
        req.validate()?;
        let chain = self.owned_chain(caller, id).await?;
        reject_archived(&chain)?;
        if chain.status == SupplyChainStatus::Completed {
            return Err(AppError::conflict("Completed supply chains cannot take new stages"));
        }

        self.db.add_stage(&id, &req).await
    }

    pub async fn update_stage(
        &self,
        caller: &AuthUser,
        id: Uuid,
        stage_id: Uuid,
        next: StageStatus,
    ) -> AppResult<Stage> {
        let chain = self.owned_chain(caller, id).await?;
        reject_archived(&chain)?;

        let stage = self.fetch_stage(&id, &stage_id).await?;
        check_stage_transition(stage.status, next)?;

        if !self.db.update_stage_status(&id, &stage_id, stage.status, next).await? {
            return Err(AppError::conflict("Stage status changed concurrently, reload and retry"));
        }
        self.fetch_stage(&id, &stage_id).await
    }

    async fn fetch(&self, id: Uuid) -> AppResult<SupplyChain> {
        self.db
            .get_supply_chain(&id)
            .await?
            .ok_or_else(|| AppError::not_found("Supply chain not found"))
    }

    async fn fetch_stage(&self, chain_id: &Uuid, stage_id: &Uuid) -> AppResult<Stage> {
        self.db
            .get_stage(chain_id, stage_id)
            .await?
            .ok_or_else(|| AppError::not_found("Stage not found"))
    }

    async fn owned_chain(&self, caller: &AuthUser, id: Uuid) -> AppResult<SupplyChain> {
        let chain = self.fetch(id).await?;
        if chain.owner_id != caller.id {
            return Err(AppError::forbidden("Only the owner can modify this supply chain"));
        }
        Ok(chain)
    }
}

fn reject_archived(chain: &SupplyChain) -> AppResult<()> {
    if chain.status == SupplyChainStatus::Archived {
        return Err(AppError::conflict("Archived supply chains are read-only"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_one_step_at_a_time() {
        assert!(check_stage_transition(StageStatus::Pending, StageStatus::InProgress).is_ok());
        assert!(check_stage_transition(StageStatus::InProgress, StageStatus::Completed).is_ok());
    }

    #[test]
    fn chains_only_move_forward_and_never_archive_through_update() {
        use SupplyChainStatus::*;

        assert!(check_chain_transition(Planning, Active).is_ok());
        assert!(check_chain_transition(Active, Completed).is_ok());
        assert!(check_chain_transition(Active, Active).is_ok());

        for (from, to) in [
            (Completed, Planning),
            (Active, Planning),
            (Planning, Completed),
            (Active, Archived),
            (Archived, Planning),
            (Archived, Archived),
        ] {
            assert!(matches!(check_chain_transition(from, to), Err(AppError::Conflict(_))), "{} -> {}", from, to);
        }
    }

    #[test]
    fn stages_cannot_skip_or_go_back() {
        for (from, to) in [
            (StageStatus::Pending, StageStatus::Completed),
            (StageStatus::Completed, StageStatus::InProgress),
            (StageStatus::InProgress, StageStatus::Pending),
            (StageStatus::Pending, StageStatus::Pending),
        ] {
            assert!(matches!(check_stage_transition(from, to), Err(AppError::Conflict(_))));
        }
    }
}
