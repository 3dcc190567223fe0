use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::utils::{trim_in_place, trim_opt_in_place, TrimFields};

text_enum! {
    SupplyChainStatus {
        Planning => "planning",
        Active => "active",
        Completed => "completed",
        Archived => "archived",
    }
}

text_enum! {
    StageStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

impl StageStatus {
    /// The only status a stage may move to from this one.
    pub fn next(&self) -> Option<StageStatus> {
        match self {
            StageStatus::Pending => Some(StageStatus::InProgress),
            StageStatus::InProgress => Some(StageStatus::Completed),
            StageStatus::Completed => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplyChain {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: SupplyChainStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A company taking part in a supply chain
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub id: Uuid,
    pub supply_chain_id: Uuid,
    pub company_name: String,
    pub role: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One step of the material flow, ordered by position
#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    pub id: Uuid,
    pub supply_chain_id: Uuid,
    pub position: i32,
    pub name: String,
    pub location: Option<String>,
    pub material_id: Option<Uuid>,
    pub status: StageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SupplyChainDetail {
    #[serde(flatten)]
    pub chain: SupplyChain,
    pub participants: Vec<Participant>,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateSupplyChainRequest {
    #[validate(length(min = 2, max = 150, message = "Name must be 2-150 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
}

impl TrimFields for CreateSupplyChainRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.name);
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct UpdateSupplyChainRequest {
    #[validate(length(min = 2, max = 150, message = "Name must be 2-150 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub status: Option<SupplyChainStatus>,
}

impl TrimFields for UpdateSupplyChainRequest {
    fn trim_fields(&mut self) {
        trim_opt_in_place(&mut self.name);
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct AddParticipantRequest {
    #[validate(length(min = 2, max = 150, message = "Company name must be 2-150 characters"))]
    pub company_name: String,

    #[validate(length(min = 2, max = 50, message = "Role must be 2-50 characters"))]
    pub role: String,

    pub user_id: Option<Uuid>,
}

impl TrimFields for AddParticipantRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.company_name);
        trim_in_place(&mut self.role);
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct AddStageRequest {
    #[validate(length(min = 2, max = 150, message = "Stage name must be 2-150 characters"))]
    pub name: String,

    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,

    pub material_id: Option<Uuid>,
}

impl TrimFields for AddStageRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.name);
        trim_opt_in_place(&mut self.location);
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateStageStatusRequest {
    pub status: StageStatus,
}
