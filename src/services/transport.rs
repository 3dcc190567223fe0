use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::DatabaseService;
use crate::error::{AppError, AppResult};
use crate::models::{CreateTransportRequest, TransactionStatus, TransportRequest, TransportStatus, UserRole};
use crate::utils::TrimFields;

/// Check a transport status change against the job's progression and who
/// is asking. Assignment has its own endpoint and never goes through here.
pub fn check_transport_transition(request: &TransportRequest, next: TransportStatus, user_id: Uuid) -> AppResult<()> {
    use TransportStatus::*;

    match (request.status, next) {
        (Assigned, PickedUp) | (PickedUp, Delivered) => {
            if request.transporter_id != Some(user_id) {
                return Err(AppError::forbidden("Only the assigned transporter can update this job"));
            }
            Ok(())
        }
        (Requested, Cancelled) | (Assigned, Cancelled) => {
            if request.requested_by != user_id {
                return Err(AppError::forbidden("Only the requester can cancel this transport"));
            }
            Ok(())
        }
        (from, to) => Err(AppError::conflict(format!("Cannot move a {} transport to {}", from, to))),
    }
}

/// Pickup and delivery of traded goods
pub struct TransportService {
    pub db: Arc<DatabaseService>,
}

impl TransportService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn create_request(&self, caller: &AuthUser, mut req: CreateTransportRequest) -> AppResult<TransportRequest> {
        req.trim_fields();
        req.validate()?;

        let transaction = self
            .db
            .get_transaction(&req.transaction_id)
            .await?
            .ok_or_else(|| AppError::not_found("Transaction not found"))?;
        if transaction.party_role(caller.id).is_none() {
            return Err(AppError::forbidden("You are not a party to this transaction"));
        }
        if transaction.status != TransactionStatus::Accepted {
            return Err(AppError::conflict("Transport can only be requested for accepted transactions"));
        }

        let id = self.db.create_transport_request(&caller.id, &req).await?;
        log::info!("Transport {} requested for transaction {}", id, transaction.id);
        self.fetch(id).await
    }

    pub async fn list_requests(&self, caller: &AuthUser) -> AppResult<Vec<TransportRequest>> {
        self.db.list_transport_requests(&caller.id, caller.role).await
    }

    pub async fn get_request(&self, caller: &AuthUser, id: Uuid) -> AppResult<TransportRequest> {
        let request = self.fetch(id).await?;
        if caller.is_admin()
            || request.requested_by == caller.id
            || request.transporter_id == Some(caller.id)
            || (caller.role == UserRole::Transporter && request.status == TransportStatus::Requested)
        {
            return Ok(request);
        }

        let transaction = self.db.get_transaction(&request.transaction_id).await?;
        match transaction {
            Some(t) if t.party_role(caller.id).is_some() => Ok(request),
            _ => Err(AppError::forbidden("You do not have access to this transport request")),
        }
    }

    /// A transporter takes an open job
    pub async fn assign(&self, caller: &AuthUser, id: Uuid) -> AppResult<TransportRequest> {
        if caller.role != UserRole::Transporter {
            return Err(AppError::forbidden("Only transporters can take transport jobs"));
        }

        let request = self.fetch(id).await?;
        if request.status != TransportStatus::Requested {
            return Err(AppError::conflict("Transport request is no longer open"));
        }
        if !self.db.assign_transport(&id, &caller.id).await? {
            return Err(AppError::conflict("Transport request is no longer open"));
        }

        log::info!("Transport {} assigned to {}", id, caller.id);
        self.fetch(id).await
    }

    pub async fn update_status(&self, caller: &AuthUser, id: Uuid, next: TransportStatus) -> AppResult<TransportRequest> {
        let request = self.fetch(id).await?;
        check_transport_transition(&request, next, caller.id)?;

        if !self.db.update_transport_status(&id, request.status, next).await? {
            return Err(AppError::conflict("Transport status changed concurrently, reload and retry"));
        }

        log::info!("Transport {} moved {} -> {} by {}", id, request.status, next, caller.id);
        self.fetch(id).await
    }

    async fn fetch(&self, id: Uuid) -> AppResult<TransportRequest> {
        self.db
            .get_transport_request(&id)
            .await?
            .ok_or_else(|| AppError::not_found("Transport request not found"))
    }
}
