use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{claim_time, fingerprint, AuthService, AuthUser, Claims};
use crate::database::DatabaseService;
use crate::error::{AppError, AppResult};
use crate::models::{
    AuthResponse, ChangePasswordRequest, ClientInfo, LoginRequest, Paginated, PublicProfile, RegisterRequest,
    Session, UpdateProfileRequest, User, UserListQuery, UserResponse, UserRole,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const ACCOUNT_LOCKED: &str = "Account is temporarily locked";

/// User service for business logic
pub struct UserService {
    pub db: Arc<DatabaseService>,
    pub auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseService>, auth: Arc<AuthService>) -> Self {
        Self { db, auth }
    }

    /// Register a new user and sign them in
    pub async fn register_user(&self, req: RegisterRequest, client: ClientInfo) -> AppResult<AuthResponse> {
        req.validate()?;
        if req.role == UserRole::Admin {
            return Err(AppError::bad_request("Role must be producer, buyer or transporter"));
        }

        let password_hash = self.auth.hash_password(&req.password).await?;
        let user = self.db.create_user(&req, &password_hash).await?;

        log::info!("Registered {} account {}", user.role, user.id);
        self.open_session(&user, client).await
    }

    /// Authenticate user
    pub async fn login_user(&self, req: LoginRequest, client: ClientInfo) -> AppResult<AuthResponse> {
        req.validate()?;

        let user = self
            .db
            .get_user_by_email(&req.email)
            .await?
            .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

        let now = Utc::now();
        if user.is_locked(now) {
            log::warn!("Login attempt on locked account {}", user.id);
            return Err(AppError::Locked(ACCOUNT_LOCKED.to_string()));
        }

        if !self.auth.verify_password(&req.password, &user.password_hash).await? {
            let max_attempts = self.auth.max_login_attempts();
            let attempts = self
                .db
                .record_failed_login(&user.id, max_attempts, now + self.auth.lockout_duration())
                .await?;

            if attempts >= max_attempts {
                log::warn!("Account {} locked after {} failed logins", user.id, attempts);
                return Err(AppError::Locked(ACCOUNT_LOCKED.to_string()));
            }
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        if !user.is_active {
            return Err(AppError::forbidden("Account is deactivated"));
        }

        self.db.record_successful_login(&user.id).await?;
        self.open_session(&user, client).await
    }

    /// Exchange a refresh token for a new pair. Each refresh token works once.
    pub async fn refresh_token(&self, refresh_token: &str, client: ClientInfo) -> AppResult<AuthResponse> {
        let claims = self.auth.validate_refresh_token(refresh_token)?;

        let Some(session) = self.db.consume_refresh_session(&claims.jti).await? else {
            log::warn!(
                "Rejected refresh token {} (already used or session ended)",
                fingerprint(refresh_token)
            );
            return Err(AppError::unauthorized("Invalid or expired refresh token"));
        };

        self.db.revoke_token(&claims.jti, claim_time(claims.exp)).await?;
        self.db
            .revoke_token(&session.access_jti, Some(session.expires_at))
            .await?;

        let user = self
            .db
            .get_user_by_id(&session.user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid or expired refresh token"))?;
        if !user.is_active {
            return Err(AppError::forbidden("Account is deactivated"));
        }

        self.open_session(&user, client).await
    }

    /// Logout user (revoke the access token and end its session)
    pub async fn logout_user(&self, claims: &Claims) -> AppResult<()> {
        self.db.revoke_token(&claims.jti, claim_time(claims.exp)).await?;
        if self.db.end_session_by_access_jti(&claims.jti).await?.is_none() {
            log::debug!("Logout for token {} without a tracked session", claims.jti);
        }
        Ok(())
    }

    /// Get user profile
    pub async fn get_user_profile(&self, user_id: Uuid) -> AppResult<UserResponse> {
        let user = self.require_user(&user_id).await?;
        Ok(UserResponse::from(&user))
    }

    /// What other members see about a user
    pub async fn get_public_profile(&self, user_id: Uuid) -> AppResult<PublicProfile> {
        match self.db.get_user_by_id(&user_id).await? {
            Some(user) if user.is_active => Ok(PublicProfile::from(&user)),
            _ => Err(AppError::not_found("User not found")),
        }
    }

    /// Update user profile
    pub async fn update_user_profile(&self, user_id: Uuid, req: UpdateProfileRequest) -> AppResult<UserResponse> {
        req.validate()?;
        if req.is_empty() {
            return Err(AppError::bad_request("No fields to update"));
        }

        let user = self
            .db
            .update_user_profile(user_id, req)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        Ok(UserResponse::from(&user))
    }

    /// Replace the password and end every other session
    pub async fn change_password(&self, caller: &AuthUser, req: ChangePasswordRequest) -> AppResult<()> {
        req.validate()?;

        let user = self.require_user(&caller.id).await?;
        if !self.auth.verify_password(&req.current_password, &user.password_hash).await? {
            return Err(AppError::unauthorized("Current password is incorrect"));
        }

        let password_hash = self.auth.hash_password(&req.new_password).await?;
        self.db.update_password(&user.id, &password_hash).await?;

        let ended = self
            .db
            .end_user_sessions(&user.id, Some(&caller.claims.jti))
            .await?;
        log::info!("Password changed for {}; ended {} other sessions", user.id, ended);
        Ok(())
    }

    /// Deactivate user account
    pub async fn deactivate_user(&self, user_id: Uuid) -> AppResult<()> {
        if !self.db.set_user_active(&user_id, false).await? {
            return Err(AppError::not_found("User not found"));
        }
        self.db.end_user_sessions(&user_id, None).await?;
        Ok(())
    }

    /// Admin toggle of another account
    pub async fn set_user_active(&self, admin: &AuthUser, user_id: Uuid, active: bool) -> AppResult<UserResponse> {
        admin.require_admin()?;
        if !active && admin.id == user_id {
            return Err(AppError::bad_request("Administrators cannot deactivate themselves"));
        }

        if active {
            if !self.db.set_user_active(&user_id, true).await? {
                return Err(AppError::not_found("User not found"));
            }
        } else {
            self.deactivate_user(user_id).await?;
        }

        log::info!("Admin {} set account {} active={}", admin.id, user_id, active);
        self.get_user_profile(user_id).await
    }

    pub async fn list_users(&self, admin: &AuthUser, query: UserListQuery) -> AppResult<Paginated<UserResponse>> {
        admin.require_admin()?;

        let (users, total) = self.db.list_users(&query).await?;
        Ok(Paginated {
            items: users.iter().map(UserResponse::from).collect(),
            pagination: query.pagination().meta(total),
        })
    }

    async fn require_user(&self, user_id: &Uuid) -> AppResult<User> {
        self.db
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    async fn open_session(&self, user: &User, client: ClientInfo) -> AppResult<AuthResponse> {
        let tokens = self.auth.generate_tokens(user)?;

        let session = Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            access_jti: tokens.access_jti.clone(),
            refresh_jti: tokens.refresh_jti.clone(),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
            is_active: true,
            created_at: Utc::now(),
        };
        self.db.create_session(&session).await?;

        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in,
        })
    }
}

/// Session service for session management
pub struct SessionService {
    pub db: Arc<DatabaseService>,
}

impl SessionService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Clean up expired sessions and stale revocations
    pub async fn cleanup_expired_sessions(&self) -> AppResult<(u64, u64)> {
        self.db.cleanup_expired_sessions().await
    }

    /// Get user sessions
    pub async fn get_user_sessions(&self, user_id: Uuid) -> AppResult<Vec<Session>> {
        self.db.get_user_sessions(&user_id).await
    }

    /// End one of the caller's sessions
    pub async fn end_session(&self, user_id: Uuid, session_id: Uuid) -> AppResult<()> {
        if !self.db.end_user_session(&user_id, &session_id).await? {
            return Err(AppError::not_found("Session not found"));
        }
        Ok(())
    }
}
