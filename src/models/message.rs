use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Latest state of the thread between the caller and one counterpart
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub counterpart_id: Uuid,
    pub counterpart_username: String,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,

    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub body: String,

    pub listing_id: Option<Uuid>,
}
