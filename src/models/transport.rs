use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::utils::{trim_in_place, TrimFields};

text_enum! {
    TransportStatus {
        Requested => "requested",
        Assigned => "assigned",
        PickedUp => "picked_up",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

impl TransportStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, TransportStatus::Delivered | TransportStatus::Cancelled)
    }
}

/// Pickup of the goods of an accepted transaction
#[derive(Debug, Clone, Serialize)]
pub struct TransportRequest {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub requested_by: Uuid,
    pub transporter_id: Option<Uuid>,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub pickup_date: Option<NaiveDate>,
    pub status: TransportStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateTransportRequest {
    pub transaction_id: Uuid,

    #[validate(length(min = 2, max = 300, message = "Pickup location must be 2-300 characters"))]
    pub pickup_location: String,

    #[validate(length(min = 2, max = 300, message = "Dropoff location must be 2-300 characters"))]
    pub dropoff_location: String,

    pub pickup_date: Option<NaiveDate>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

impl TrimFields for CreateTransportRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.pickup_location);
        trim_in_place(&mut self.dropoff_location);
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateTransportStatusRequest {
    pub status: TransportStatus,
}
