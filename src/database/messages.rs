use tokio_postgres::Row;
use uuid::Uuid;

use super::DatabaseService;
use crate::error::AppResult;
use crate::models::{Conversation, Message, SendMessageRequest};
use crate::utils::PaginationParams;

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, listing_id, body, read_at, created_at";

impl DatabaseService {
    pub async fn create_message(&self, sender_id: &Uuid, req: &SendMessageRequest) -> AppResult<Message> {
        let client = self.get_client().await?;

        let sql = format!(
            "INSERT INTO messages (sender_id, recipient_id, listing_id, body)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            MESSAGE_COLUMNS
        );
        let row = client
            .query_one(
                sql.as_str(),
                &[sender_id, &req.recipient_id, &req.listing_id, &req.body],
            )
            .await?;

        Ok(Self::row_to_message(&row))
    }

    /// One entry per counterpart, most recent thread first
    pub async fn list_conversations(&self, user_id: &Uuid) -> AppResult<Vec<Conversation>> {
        let client = self.get_client().await?;

        let rows = client
            .query(
                "WITH thread AS (
                     SELECT CASE WHEN sender_id = $1 THEN recipient_id ELSE sender_id END AS counterpart_id,
                            sender_id, body, read_at, created_at
                     FROM messages
                     WHERE sender_id = $1 OR recipient_id = $1
                 ),
                 latest AS (
                     SELECT DISTINCT ON (counterpart_id) counterpart_id, body, created_at
                     FROM thread
                     ORDER BY counterpart_id, created_at DESC
                 )
                 SELECT latest.counterpart_id, u.username AS counterpart_username,
                        latest.body AS last_message, latest.created_at AS last_message_at,
                        (SELECT COUNT(*) FROM thread t
                         WHERE t.counterpart_id = latest.counterpart_id
                           AND t.sender_id <> $1 AND t.read_at IS NULL) AS unread_count
                 FROM latest
                 JOIN users u ON u.id = latest.counterpart_id
                 ORDER BY latest.created_at DESC",
                &[user_id],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| Conversation {
                counterpart_id: row.get("counterpart_id"),
                counterpart_username: row.get("counterpart_username"),
                last_message: row.get("last_message"),
                last_message_at: row.get("last_message_at"),
                unread_count: row.get("unread_count"),
            })
            .collect())
    }

    /// A page of the thread between two users, newest first
    pub async fn get_conversation(
        &self,
        user_id: &Uuid,
        other_id: &Uuid,
        page: PaginationParams,
    ) -> AppResult<(Vec<Message>, i64)> {
        let client = self.get_client().await?;

        let pair = "(sender_id = $1 AND recipient_id = $2) OR (sender_id = $2 AND recipient_id = $1)";

        let total: i64 = client
            .query_one(format!("SELECT COUNT(*) FROM messages WHERE {}", pair).as_str(), &[user_id, other_id])
            .await?
            .get(0);

        let sql = format!(
            "SELECT {} FROM messages WHERE {} ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            MESSAGE_COLUMNS, pair
        );
        let rows = client
            .query(sql.as_str(), &[user_id, other_id, &(page.limit() as i64), &page.offset()])
            .await?;

        Ok((rows.iter().map(Self::row_to_message).collect(), total))
    }

    /// Mark everything `other_id` sent to `user_id` as read
    pub async fn mark_conversation_read(&self, user_id: &Uuid, other_id: &Uuid) -> AppResult<u64> {
        let client = self.get_client().await?;

        let updated = client
            .execute(
                "UPDATE messages SET read_at = NOW()
                 WHERE recipient_id = $1 AND sender_id = $2 AND read_at IS NULL",
                &[user_id, other_id],
            )
            .await?;

        Ok(updated)
    }

    pub async fn count_unread_messages(&self, user_id: &Uuid) -> AppResult<i64> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                "SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND read_at IS NULL",
                &[user_id],
            )
            .await?;

        Ok(row.get(0))
    }

    fn row_to_message(row: &Row) -> Message {
        Message {
            id: row.get("id"),
            sender_id: row.get("sender_id"),
            recipient_id: row.get("recipient_id"),
            listing_id: row.get("listing_id"),
            body: row.get("body"),
            read_at: row.get("read_at"),
            created_at: row.get("created_at"),
        }
    }
}
