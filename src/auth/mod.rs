use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::models::{User, UserRole};

pub const TOKEN_ISSUER: &str = "agriloop";
const ACCESS_TOKEN_TYPE: &str = "access";
const REFRESH_TOKEN_TYPE: &str = "refresh";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // User ID
    pub email: String,
    pub username: String,
    pub role: UserRole,
    pub typ: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

/// Refresh token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub typ: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

/// Freshly signed access/refresh pair with the ids needed to track them
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_jti: String,
    pub refresh_jti: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

/// Authentication service
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn max_login_attempts(&self) -> i32 {
        self.config.max_login_attempts
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::minutes(self.config.lockout_minutes)
    }

    /// Hash a password using bcrypt, off the async executor
    pub async fn hash_password(&self, password: &str) -> AppResult<String> {
        let cost = self.config.bcrypt_cost;
        let password = password.to_string();
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }

    /// Verify a password against its hash
    pub async fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
    }

    /// Generate access and refresh tokens for a user
    pub fn generate_tokens(&self, user: &User) -> AppResult<TokenPair> {
        let now = Utc::now();
        let access_expires_at = now + Duration::hours(self.config.jwt_expiration_hours);
        let refresh_expires_at = now + Duration::days(self.config.refresh_token_expiration_days);
        let access_jti = Uuid::new_v4().to_string();
        let refresh_jti = Uuid::new_v4().to_string();

        let access_claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            typ: ACCESS_TOKEN_TYPE.to_string(),
            exp: access_expires_at.timestamp(),
            iat: now.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
            jti: access_jti.clone(),
        };

        let refresh_claims = RefreshClaims {
            sub: user.id.to_string(),
            typ: REFRESH_TOKEN_TYPE.to_string(),
            exp: refresh_expires_at.timestamp(),
            iat: now.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
            jti: refresh_jti.clone(),
        };

        let header = Header::new(Algorithm::HS256);

        Ok(TokenPair {
            access_token: encode(&header, &access_claims, &self.encoding_key)?,
            refresh_token: encode(&header, &refresh_claims, &self.encoding_key)?,
            access_jti,
            refresh_jti,
            access_expires_at,
            refresh_expires_at,
            expires_in: self.config.jwt_expiration_hours * 3600,
        })
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iat", "iss"]);
        validation
    }

    /// Validate and decode an access token
    pub fn validate_access_token(&self, token: &str) -> AppResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Self::validation())?.claims;
        if claims.typ != ACCESS_TOKEN_TYPE {
            return Err(AppError::unauthorized("Invalid or expired token"));
        }
        Ok(claims)
    }

    /// Validate and decode a refresh token
    pub fn validate_refresh_token(&self, token: &str) -> AppResult<RefreshClaims> {
        let claims = decode::<RefreshClaims>(token, &self.decoding_key, &Self::validation())
            .map_err(|_| AppError::unauthorized("Invalid or expired refresh token"))?
            .claims;
        if claims.typ != REFRESH_TOKEN_TYPE {
            return Err(AppError::unauthorized("Invalid or expired refresh token"));
        }
        Ok(claims)
    }
}

/// Hash a token for log correlation without storing the token itself
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// Convert a unix timestamp claim back into a UTC instant
pub fn claim_time(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extract token from request headers
pub fn extract_token_from_request(req: &impl HttpMessage) -> Option<String> {
    // Try Authorization header first
    if let Some(auth_header) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = extract_bearer_token(auth_str) {
                return Some(token.to_string());
            }
        }
    }

    // Try cookie as fallback
    let cookie_str = req.headers().get("cookie")?.to_str().ok()?;
    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().strip_prefix("access_token="))
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Authenticated caller, resolved from the claims the auth middleware stored
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
    pub claims: Claims,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Fail with 403 unless the caller holds one of `roles` or is an admin.
    pub fn require_role(&self, roles: &[UserRole]) -> AppResult<()> {
        if self.is_admin() || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "This action requires one of the roles: {}",
                roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
            )))
        }
    }

    pub fn require_admin(&self) -> AppResult<()> {
        self.require_role(&[UserRole::Admin])
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::unauthorized("Invalid token subject"))?;
        Ok(Self { id, role: claims.role, claims })
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<Claims>().cloned();
        ready(
            claims
                .ok_or_else(|| AppError::unauthorized("Unauthorized"))
                .and_then(AuthUser::try_from),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "producer@agriloop.test".to_string(),
            username: "producer".to_string(),
            password_hash: String::new(),
            role,
            full_name: None,
            company_name: None,
            phone: None,
            location: None,
            bio: None,
            is_active: true,
            is_email_verified: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
            login_attempts: 0,
            locked_until: None,
        }
    }

    #[test]
    fn access_token_round_trips() {
        let auth = AuthService::new(AuthConfig::for_tests());
        let u = user(UserRole::Producer);
        let pair = auth.generate_tokens(&u).unwrap();

        let claims = auth.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.sub, u.id.to_string());
        assert_eq!(claims.role, UserRole::Producer);
        assert_eq!(claims.jti, pair.access_jti);
        assert_eq!(pair.expires_in, 3600);
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let auth = AuthService::new(AuthConfig::for_tests());
        let pair = auth.generate_tokens(&user(UserRole::Buyer)).unwrap();

        assert!(auth.validate_access_token(&pair.refresh_token).is_err());
        assert!(auth.validate_refresh_token(&pair.access_token).is_err());
        assert_eq!(auth.validate_refresh_token(&pair.refresh_token).unwrap().jti, pair.refresh_jti);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let auth = AuthService::new(AuthConfig::for_tests());
        let mut other_cfg = AuthConfig::for_tests();
        other_cfg.jwt_secret = "a-completely-different-secret".to_string();
        let other = AuthService::new(other_cfg);

        let pair = other.generate_tokens(&user(UserRole::Buyer)).unwrap();
        assert!(auth.validate_access_token(&pair.access_token).is_err());
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let auth = AuthService::new(AuthConfig::for_tests());
        let hash = auth.hash_password("Compost2024").await.unwrap();
        assert!(auth.verify_password("Compost2024", &hash).await.unwrap());
        assert!(!auth.verify_password("compost2024", &hash).await.unwrap());
    }

    #[test]
    fn bearer_and_cookie_tokens_are_extracted() {
        let req = TestRequest::default()
            .insert_header(("authorization", "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(extract_token_from_request(&req).as_deref(), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header(("cookie", "theme=dark; access_token=xyz"))
            .to_http_request();
        assert_eq!(extract_token_from_request(&req).as_deref(), Some("xyz"));

        let req = TestRequest::default()
            .insert_header(("authorization", "Basic Zm9vOmJhcg=="))
            .to_http_request();
        assert_eq!(extract_token_from_request(&req), None);
    }

    #[test]
    fn role_requirements() {
        let auth = AuthService::new(AuthConfig::for_tests());
        for (role, allowed) in [
            (UserRole::Producer, true),
            (UserRole::Admin, true),
            (UserRole::Buyer, false),
        ] {
            let pair = auth.generate_tokens(&user(role)).unwrap();
            let claims = auth.validate_access_token(&pair.access_token).unwrap();
            let caller = AuthUser::try_from(claims).unwrap();
            assert_eq!(caller.require_role(&[UserRole::Producer]).is_ok(), allowed);
        }
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        assert_eq!(fingerprint("token"), fingerprint("token"));
        assert_eq!(fingerprint("token").len(), 16);
        assert_ne!(fingerprint("token"), fingerprint("other"));
    }
}
