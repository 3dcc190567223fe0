use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::DatabaseService;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateTransactionRequest, Paginated, PartyRole, Transaction, TransactionQuery, TransactionStatus, UserRole,
};

/// Which party may move a transaction from one status to another.
/// `None` means the move is not part of the lifecycle at all.
pub fn allowed_actors(from: TransactionStatus, to: TransactionStatus) -> Option<&'static [PartyRole]> {
    use PartyRole::{Buyer, Seller};
    use TransactionStatus::*;

    match (from, to) {
        (Pending, Accepted) | (Pending, Rejected) => Some(&[Seller]),
        (Pending, Cancelled) => Some(&[Buyer]),
        (Accepted, InTransit) => Some(&[Seller]),
        (Accepted, Cancelled) => Some(&[Buyer, Seller]),
        (InTransit, Delivered) => Some(&[Buyer]),
        (Delivered, Completed) => Some(&[Buyer, Seller]),
        _ => None,
    }
}

/// Check a requested status change against the lifecycle and the acting party
pub fn check_transition(from: TransactionStatus, to: TransactionStatus, actor: PartyRole) -> AppResult<()> {
    let actors = allowed_actors(from, to)
        .ok_or_else(|| AppError::conflict(format!("Cannot move a {} transaction to {}", from, to)))?;

    if !actors.contains(&actor) {
        return Err(AppError::forbidden(format!(
            "Only the {} can move this transaction to {}",
            actors.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(" or "),
            to
        )));
    }
    Ok(())
}

/// Purchases between buyers and sellers
pub struct TransactionService {
    pub db: Arc<DatabaseService>,
}

impl TransactionService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Place an order on a listing, reserving the quantity
    pub async fn create_transaction(&self, caller: &AuthUser, req: CreateTransactionRequest) -> AppResult<Transaction> {
        caller.require_role(&[UserRole::Buyer])?;
        req.validate()?;

        let id = self.db.create_transaction(&caller.id, &req).await?;
        log::info!(
            "Transaction {} opened by {} for {} on listing {}",
            id,
            caller.id,
            req.quantity,
            req.listing_id
        );
        self.fetch(id).await
    }

    pub async fn list_transactions(
        &self,
        caller: &AuthUser,
        query: TransactionQuery,
    ) -> AppResult<Paginated<Transaction>> {
        let (items, total) = self.db.list_user_transactions(&caller.id, &query).await?;
        Ok(Paginated {
            items,
            pagination: query.pagination().meta(total),
        })
    }

    pub async fn get_transaction(&self, caller: &AuthUser, id: Uuid) -> AppResult<Transaction> {
        let transaction = self.fetch(id).await?;
        if transaction.party_role(caller.id).is_none() && !caller.is_admin() {
            return Err(AppError::forbidden("You are not a party to this transaction"));
        }
        Ok(transaction)
    }

    pub async fn update_status(
        &self,
        caller: &AuthUser,
        id: Uuid,
        next: TransactionStatus,
    ) -> AppResult<Transaction> {
        let transaction = self.fetch(id).await?;
        let actor = transaction
            .party_role(caller.id)
            .ok_or_else(|| AppError::forbidden("You are not a party to this transaction"))?;

        check_transition(transaction.status, next, actor)?;

        if !self.db.update_transaction_status(&id, transaction.status, next).await? {
            return Err(AppError::conflict("Transaction status changed concurrently, reload and retry"));
        }

        log::info!(
            "Transaction {} moved {} -> {} by {} ({})",
            id,
            transaction.status,
            next,
            caller.id,
            actor
        );
        self.fetch(id).await
    }

    async fn fetch(&self, id: Uuid) -> AppResult<Transaction> {
        self.db
            .get_transaction(&id)
            .await?
            .ok_or_else(|| AppError::not_found("Transaction not found"))
    }
}
