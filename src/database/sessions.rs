use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

use super::DatabaseService;
use crate::error::AppResult;
use crate::models::Session;

const SESSION_COLUMNS: &str = "id, user_id, access_jti, refresh_jti, ip_address, user_agent, \
     expires_at, refresh_expires_at, is_active, created_at";

impl DatabaseService {
    /// Create a new session
    pub async fn create_session(&self, session: &Session) -> AppResult<()> {
        let client = self.get_client().await?;

        client
            .execute(
                "INSERT INTO sessions (id, user_id, access_jti, refresh_jti, ip_address,
                                       user_agent, expires_at, refresh_expires_at, is_active)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &session.id,
                    &session.user_id,
                    &session.access_jti,
                    &session.refresh_jti,
                    &session.ip_address,
                    &session.user_agent,
                    &session.expires_at,
                    &session.refresh_expires_at,
                    &session.is_active,
                ],
            )
            .await?;

        Ok(())
    }

    /// Atomically end the live session a refresh token belongs to.
    ///
    /// Returns `None` if the token was already used, the session was ended or
    /// it expired, so a replayed refresh token can never mint a second pair.
    pub async fn consume_refresh_session(&self, refresh_jti: &str) -> AppResult<Option<Session>> {
        let client = self.get_client().await?;

        let sql = format!(
            "UPDATE sessions SET is_active = false
             WHERE refresh_jti = $1 AND is_active = true AND refresh_expires_at > NOW()
             RETURNING {}",
            SESSION_COLUMNS
        );
        Ok(client
            .query_opt(sql.as_str(), &[&refresh_jti])
            .await?
            .map(|row| Self::row_to_session(&row)))
    }

    /// End the session an access token was issued for
    pub async fn end_session_by_access_jti(&self, access_jti: &str) -> AppResult<Option<Session>> {
        let client = self.get_client().await?;

        let sql = format!(
            "UPDATE sessions SET is_active = false WHERE access_jti = $1 RETURNING {}",
            SESSION_COLUMNS
        );
        Ok(client
            .query_opt(sql.as_str(), &[&access_jti])
            .await?
            .map(|row| Self::row_to_session(&row)))
    }

    /// End one of a user's sessions. Returns false if it is not theirs.
    pub async fn end_user_session(&self, user_id: &Uuid, session_id: &Uuid) -> AppResult<bool> {
        let client = self.get_client().await?;

        let updated = client
            .execute(
                "UPDATE sessions SET is_active = false WHERE id = $1 AND user_id = $2",
                &[session_id, user_id],
            )
            .await?;

        Ok(updated > 0)
    }

    /// End every session of a user, optionally sparing the one behind
    /// `keep_access_jti`
    pub async fn end_user_sessions(&self, user_id: &Uuid, keep_access_jti: Option<&str>) -> AppResult<u64> {
        let client = self.get_client().await?;

        let updated = client
            .execute(
                "UPDATE sessions SET is_active = false
                 WHERE user_id = $1 AND is_active = true AND ($2::VARCHAR IS NULL OR access_jti <> $2)",
                &[user_id, &keep_access_jti],
            )
            .await?;

        Ok(updated)
    }

    /// Active sessions of a user, newest first
    pub async fn get_user_sessions(&self, user_id: &Uuid) -> AppResult<Vec<Session>> {
        let client = self.get_client().await?;

        let sql = format!(
            "SELECT {} FROM sessions
             WHERE user_id = $1 AND is_active = true AND refresh_expires_at > NOW()
             ORDER BY created_at DESC",
            SESSION_COLUMNS
        );
        let rows = client.query(sql.as_str(), &[user_id]).await?;

        Ok(rows.iter().map(Self::row_to_session).collect())
    }

    /// Revoke a token by JTI and optional expiry time
    pub async fn revoke_token(&self, jti: &str, expires_at: Option<DateTime<Utc>>) -> AppResult<()> {
        let client = self.get_client().await?;

        client
            .execute(
                "INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2)
                 ON CONFLICT (jti) DO UPDATE SET revoked_at = NOW(), expires_at = EXCLUDED.expires_at",
                &[&jti, &expires_at],
            )
            .await?;

        Ok(())
    }

    /// Whether an access token may no longer be used: either its JTI was
    /// revoked or the session it was issued for has ended
    pub async fn is_token_revoked(&self, jti: &str) -> AppResult<bool> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)
                     OR EXISTS (SELECT 1 FROM sessions WHERE access_jti = $1 AND is_active = false)",
                &[&jti],
            )
            .await?;

        Ok(row.get(0))
    }

    /// Drop sessions whose refresh window has passed and revocations of
    /// tokens that have expired anyway
    pub async fn cleanup_expired_sessions(&self) -> AppResult<(u64, u64)> {
        let client = self.get_client().await?;

        let sessions = client
            .execute("DELETE FROM sessions WHERE refresh_expires_at < NOW()", &[])
            .await?;
        let revocations = client
            .execute("DELETE FROM revoked_tokens WHERE expires_at < NOW()", &[])
            .await?;

        log::debug!(
            "cleanup_expired_sessions removed {} sessions and {} revocations",
            sessions,
            revocations
        );
        Ok((sessions, revocations))
    }

    /// Helper to convert database row to Session
    fn row_to_session(row: &Row) -> Session {
        Session {
            id: row.get("id"),
            user_id: row.get("user_id"),
            access_jti: row.get("access_jti"),
            refresh_jti: row.get("refresh_jti"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            expires_at: row.get("expires_at"),
            refresh_expires_at: row.get("refresh_expires_at"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
        }
    }
}
