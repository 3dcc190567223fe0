use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

use super::{enum_column, DatabaseService, SqlParams, UpdateBuilder, WhereClause};
use crate::error::AppResult;
use crate::models::{RegisterRequest, UpdateProfileRequest, User, UserListQuery};
use crate::utils::{like_pattern, non_blank};

const USER_COLUMNS: &str = "id, email, username, password_hash, role, full_name, company_name, phone, \
     location, bio, is_active, is_email_verified, created_at, updated_at, last_login_at, \
     login_attempts, locked_until";

impl DatabaseService {
    /// Create a new user
    pub async fn create_user(&self, req: &RegisterRequest, password_hash: &str) -> AppResult<User> {
        let client = self.get_client().await?;

        let sql = format!(
            "INSERT INTO users (email, username, password_hash, role, full_name, company_name)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            USER_COLUMNS
        );
        let row = client
            .query_one(
                sql.as_str(),
                &[
                    &req.email.to_lowercase(),
                    &req.username,
                    &password_hash,
                    &req.role.as_str(),
                    &req.full_name,
                    &req.company_name,
                ],
            )
            .await?;

        Self::row_to_user(&row)
    }

    /// Get user by ID
    pub async fn get_user_by_id(&self, id: &Uuid) -> AppResult<Option<User>> {
        let client = self.get_client().await?;

        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        client
            .query_opt(sql.as_str(), &[id])
            .await?
            .map(|row| Self::row_to_user(&row))
            .transpose()
    }

    /// Get user by email (case-insensitive)
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let client = self.get_client().await?;

        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        client
            .query_opt(sql.as_str(), &[&email.to_lowercase()])
            .await?
            .map(|row| Self::row_to_user(&row))
            .transpose()
    }

    /// Reset failed attempts and stamp the login time
    pub async fn record_successful_login(&self, user_id: &Uuid) -> AppResult<()> {
        let client = self.get_client().await?;

        client
            .execute(
                "UPDATE users
                 SET last_login_at = NOW(), login_attempts = 0, locked_until = NULL, updated_at = NOW()
                 WHERE id = $1",
                &[user_id],
            )
            .await?;

        Ok(())
    }

    /// Count a failed login; lock the account once `max_attempts` is reached.
    /// A lock that has run out starts the count over. Returns the attempt
    /// count after the increment.
    pub async fn record_failed_login(
        &self,
        user_id: &Uuid,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> AppResult<i32> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                "WITH counted AS (
                     SELECT id,
                            CASE WHEN locked_until <= NOW() THEN 1 ELSE login_attempts + 1 END AS attempts
                     FROM users WHERE id = $1
                 )
                 UPDATE users u
                 SET login_attempts = counted.attempts,
                     locked_until = CASE WHEN counted.attempts >= $2 THEN $3 ELSE NULL END,
                     updated_at = NOW()
                 FROM counted
                 WHERE u.id = counted.id
                 RETURNING u.login_attempts",
                &[user_id, &max_attempts, &lock_until],
            )
            .await?;

        Ok(row.get(0))
    }

    /// Apply the fields present in a profile update. Returns `None` when the
    /// user does not exist.
    pub async fn update_user_profile(&self, user_id: Uuid, req: UpdateProfileRequest) -> AppResult<Option<User>> {
        let mut update = UpdateBuilder::new("users");
        update
            .set("username", req.username)
            .set("email", req.email.map(|e| e.to_lowercase()))
            .set("full_name", req.full_name)
            .set("company_name", req.company_name)
            .set("phone", req.phone)
            .set("location", req.location)
            .set("bio", req.bio)
            .touch("updated_at = NOW()");

        if !update.has_changes() {
            return self.get_user_by_id(&user_id).await;
        }

        let (sql, params) = update.build(user_id, Some(USER_COLUMNS));
        self.query_opt_dynamic(&sql, &params)
            .await?
            .map(|row| Self::row_to_user(&row))
            .transpose()
    }

    pub async fn update_password(&self, user_id: &Uuid, password_hash: &str) -> AppResult<()> {
        let client = self.get_client().await?;

        client
            .execute(
                "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
                &[user_id, &password_hash],
            )
            .await?;

        Ok(())
    }

    /// Flip the soft-delete flag. Returns false when no such user exists.
    pub async fn set_user_active(&self, user_id: &Uuid, active: bool) -> AppResult<bool> {
        let client = self.get_client().await?;

        let updated = client
            .execute(
                "UPDATE users SET is_active = $2, login_attempts = 0, locked_until = NULL, updated_at = NOW()
                 WHERE id = $1",
                &[user_id, &active],
            )
            .await?;

        Ok(updated > 0)
    }

    /// Page through users for the admin console
    pub async fn list_users(&self, query: &UserListQuery) -> AppResult<(Vec<User>, i64)> {
        let mut params = SqlParams::new();
        let mut filter = WhereClause::new();

        if let Some(role) = query.role {
            let p = params.push(role.as_str().to_string());
            filter.push(format!("role = {}", p));
        }
        if let Some(search) = non_blank(query.search.as_deref()) {
            let p = params.push(like_pattern(&search));
            filter.push(format!(
                "(username ILIKE {p} OR email ILIKE {p} OR company_name ILIKE {p} OR full_name ILIKE {p})"
            ));
        }

        let where_sql = filter.to_sql();
        let total = self
            .count_dynamic(&format!("SELECT COUNT(*) FROM users{}", where_sql), &params)
            .await?;

        let page = query.pagination();
        let limit = params.push(page.limit() as i64);
        let offset = params.push(page.offset());
        let sql = format!(
            "SELECT {} FROM users{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            USER_COLUMNS, where_sql, limit, offset
        );

        let users = self
            .query_dynamic(&sql, &params)
            .await?
            .iter()
            .map(Self::row_to_user)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((users, total))
    }

    /// Helper to convert database row to User
    pub(crate) fn row_to_user(row: &Row) -> AppResult<User> {
        Ok(User {
            id: row.get("id"),
            email: row.get("email"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            role: enum_column(row, "role")?,
            full_name: row.get("full_name"),
            company_name: row.get("company_name"),
            phone: row.get("phone"),
            location: row.get("location"),
            bio: row.get("bio"),
            is_active: row.get("is_active"),
            is_email_verified: row.get("is_email_verified"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            last_login_at: row.get("last_login_at"),
            login_attempts: row.get("login_attempts"),
            locked_until: row.get("locked_until"),
        })
    }
}
