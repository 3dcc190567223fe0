use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::PaginationParams;

text_enum! {
    /// Lifecycle of a purchase between a buyer and a seller
    TransactionStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        InTransit => "in_transit",
        Delivered => "delivered",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl TransactionStatus {
    /// Statuses in which the reserved quantity is still held for the buyer.
    pub fn holds_quantity(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Pending | TransactionStatus::Accepted | TransactionStatus::InTransit
        )
    }

    /// Column text of every status that holds quantity, for `status = ANY($n)`
    pub fn holding() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|s| s.holds_quantity())
            .map(|s| s.as_str())
            .collect()
    }

    /// Statuses that give the reserved quantity back to the listing.
    pub fn releases_quantity(&self) -> bool {
        matches!(self, TransactionStatus::Rejected | TransactionStatus::Cancelled)
    }
}

text_enum! {
    /// Which side of a transaction a user is on
    PartyRole {
        Buyer => "buyer",
        Seller => "seller",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub listing_title: String,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: f64,
    pub unit: String,
    pub price_per_unit: f64,
    pub total_price: f64,
    pub currency: String,
    pub status: TransactionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn party_role(&self, user_id: Uuid) -> Option<PartyRole> {
        if self.buyer_id == user_id {
            Some(PartyRole::Buyer)
        } else if self.seller_id == user_id {
            Some(PartyRole::Seller)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateTransactionRequest {
    pub listing_id: Uuid,

    #[validate(custom = "crate::utils::validate_positive_quantity")]
    pub quantity: f64,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateTransactionStatusRequest {
    pub status: TransactionStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub role: Option<PartyRole>,
    pub status: Option<TransactionStatus>,
}

impl TransactionQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams { page: self.page, limit: self.limit }
    }
}
