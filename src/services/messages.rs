use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::database::DatabaseService;
use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message, Paginated, SendMessageRequest};
use crate::utils::PaginationParams;

/// Direct messages between members
pub struct MessageService {
    pub db: Arc<DatabaseService>,
}

impl MessageService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn send(&self, caller: &AuthUser, req: SendMessageRequest) -> AppResult<Message> {
        req.validate()?;
        if req.body.trim().is_empty() {
            return Err(AppError::bad_request("Message must not be blank"));
        }
        if req.recipient_id == caller.id {
            return Err(AppError::bad_request("You cannot message yourself"));
        }

        match self.db.get_user_by_id(&req.recipient_id).await? {
            Some(user) if user.is_active => {}
            _ => return Err(AppError::not_found("Recipient not found")),
        }

        self.db.create_message(&caller.id, &req).await
    }

    pub async fn conversations(&self, caller: &AuthUser) -> AppResult<Vec<Conversation>> {
        self.db.list_conversations(&caller.id).await
    }

    /// A page of the thread with `other_id`; opening it marks what they sent
    /// as read
    pub async fn conversation_with(
        &self,
        caller: &AuthUser,
        other_id: Uuid,
        page: PaginationParams,
    ) -> AppResult<Paginated<Message>> {
        let (items, total) = self.db.get_conversation(&caller.id, &other_id, page).await?;
        let marked = self.db.mark_conversation_read(&caller.id, &other_id).await?;
        if marked > 0 {
            log::debug!("Marked {} messages from {} as read for {}", marked, other_id, caller.id);
        }

        Ok(Paginated {
            items,
            pagination: page.meta(total),
        })
    }

    pub async fn unread_count(&self, caller: &AuthUser) -> AppResult<i64> {
        self.db.count_unread_messages(&caller.id).await
    }
}
