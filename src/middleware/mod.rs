use actix_web::{
    body::BoxBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, Method},
    Error, HttpMessage, HttpResponse, ResponseError,
};

use futures_util::future::LocalBoxFuture;
use std::collections::{HashMap, VecDeque};
use std::future::{ready, Ready};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::{extract_token_from_request, AuthService, Claims};
use crate::database::DatabaseService;
use crate::error::AppError;
use crate::utils;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Routes reachable without an access token
pub fn is_public_route(method: &Method, path: &str) -> bool {
    if path == "/health" || path == "/api/status" {
        return true;
    }

    if let Some(rest) = path.strip_prefix("/api/auth/") {
        return rest != "logout";
    }

    if method == Method::GET {
        if path == "/api/listings/mine" {
            return false;
        }
        return under(path, "/api/listings") || under(path, "/api/materials");
    }

    false
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{}/", prefix))
}

/// Authentication middleware
pub struct AuthMiddleware {
    pub auth_service: Arc<AuthService>,
    pub db_service: Arc<DatabaseService>,
}

impl<S> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Arc::new(service),
            auth_service: Arc::clone(&self.auth_service),
            db_service: Arc::clone(&self.db_service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Arc<S>,
    auth_service: Arc<AuthService>,
    db_service: Arc<DatabaseService>,
}

impl<S> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let auth_service = Arc::clone(&self.auth_service);
        let db_service = Arc::clone(&self.db_service);

        Box::pin(async move {
            if is_public_route(req.method(), req.path()) {
                return service.call(req).await;
            }

            let token = match extract_token_from_request(&req) {
                Some(token) => token,
                None => {
                    let response = AppError::unauthorized("Missing authentication token").error_response();
                    return Ok(req.into_response(response));
                }
            };

            let claims = match auth_service.validate_access_token(&token) {
                Ok(claims) => claims,
                Err(_) => {
                    let response = AppError::unauthorized("Invalid or expired token").error_response();
                    return Ok(req.into_response(response));
                }
            };

            // Revoked jti or ended session
            match db_service.is_token_revoked(&claims.jti).await {
                Ok(true) => {
                    let response = AppError::unauthorized("Token revoked").error_response();
                    return Ok(req.into_response(response));
                }
                Ok(false) => {}
                Err(e) => log::warn!("Revocation check failed for {}: {}", req.path(), e),
            }

            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

/// CORS middleware
pub struct CorsMiddleware {
    pub allowed_origins: Vec<String>,
}

impl<S> Transform<S, ServiceRequest> for CorsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = CorsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorsMiddlewareService {
            service: Arc::new(service),
            allowed_origins: Arc::new(self.allowed_origins.clone()),
        }))
    }
}

pub struct CorsMiddlewareService<S> {
    service: Arc<S>,
    allowed_origins: Arc<Vec<String>>,
}

fn origin_allowed(allowed: &[String], origin: &str) -> bool {
    allowed.iter().any(|o| o == "*" || o == origin)
}

fn apply_cors_headers(headers: &mut header::HeaderMap, allowed: &[String], origin: Option<header::HeaderValue>) {
    if let Some(origin) = origin {
        let permitted = origin.to_str().map(|o| origin_allowed(allowed, o)).unwrap_or(false);
        if permitted {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(header::VARY, header::HeaderValue::from_static("Origin"));
        }
    }

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        header::HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        header::HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        header::HeaderValue::from_static("true"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, header::HeaderValue::from_static("3600"));
}

impl<S> Service<ServiceRequest> for CorsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let allowed_origins = Arc::clone(&self.allowed_origins);

        Box::pin(async move {
            let origin = req.headers().get(header::ORIGIN).cloned();

            // Preflight never reaches auth or the router
            if req.method() == Method::OPTIONS {
                let mut res = req.into_response(HttpResponse::NoContent().finish());
                apply_cors_headers(res.headers_mut(), &allowed_origins, origin);
                return Ok(res);
            }

            let mut res = service.call(req).await?;
            apply_cors_headers(res.headers_mut(), &allowed_origins, origin);
            Ok(res)
        })
    }
}

/// Sliding-window request counter keyed by caller
#[derive(Debug, Default)]
pub struct RateLimitStore {
    hits: HashMap<String, VecDeque<Instant>>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit for `key` and report whether it fits inside the window
    pub fn is_allowed(&mut self, key: &str, max_requests: u32, window_seconds: u64) -> bool {
        let window = Duration::from_secs(window_seconds);
        let now = Instant::now();
        let hits = self.hits.entry(key.to_string()).or_default();

        while let Some(oldest) = hits.front() {
            if now.duration_since(*oldest) >= window {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() >= max_requests as usize {
            return false;
        }

        hits.push_back(now);
        true
    }

    /// Drop keys with no hits inside the window
    pub fn cleanup(&mut self, window_seconds: u64) -> usize {
        let window = Duration::from_secs(window_seconds);
        let now = Instant::now();
        let before = self.hits.len();

        self.hits.retain(|_, hits| {
            hits.retain(|t| now.duration_since(*t) < window);
            !hits.is_empty()
        });

        before - self.hits.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}

/// Rate limiting middleware
pub struct RateLimitMiddleware {
    pub store: Arc<Mutex<RateLimitStore>>,
    pub max_requests: u32,
    pub window_seconds: u64,
    pub auth_service: Arc<AuthService>,
}

impl<S> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Arc::new(service),
            store: Arc::clone(&self.store),
            max_requests: self.max_requests,
            window_seconds: self.window_seconds,
            auth_service: Arc::clone(&self.auth_service),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Arc<S>,
    store: Arc<Mutex<RateLimitStore>>,
    max_requests: u32,
    window_seconds: u64,
    auth_service: Arc<AuthService>,
}

impl<S> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let store = Arc::clone(&self.store);
        let max_requests = self.max_requests;
        let window_seconds = self.window_seconds;
        let auth_service = Arc::clone(&self.auth_service);

        Box::pin(async move {
            // Prefer the user id from a valid token, then the peer address
            let user_key = extract_token_from_request(&req)
                .and_then(|token| auth_service.validate_access_token(&token).ok())
                .map(|claims| format!("user:{}", claims.sub));
            let key = match user_key {
                Some(key) => key,
                None => format!("ip:{}", req.connection_info().peer_addr().unwrap_or("unknown")),
            };

            let allowed = store.lock().await.is_allowed(&key, max_requests, window_seconds);
            if !allowed {
                log::warn!("Rate limit exceeded for {}", key);
                return Ok(req.into_response(AppError::RateLimited.error_response()));
            }

            service.call(req).await
        })
    }
}

/// Request size limiting middleware
pub struct RequestSizeLimitMiddleware {
    pub max_size: usize,
}

impl<S> Transform<S, ServiceRequest> for RequestSizeLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestSizeLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestSizeLimitMiddlewareService {
            service: Arc::new(service),
            max_size: self.max_size,
        }))
    }
}

pub struct RequestSizeLimitMiddlewareService<S> {
    service: Arc<S>,
    max_size: usize,
}

impl<S> Service<ServiceRequest> for RequestSizeLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let max_size = self.max_size;

        Box::pin(async move {
            let length = req
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());

            if let Some(length) = length {
                if length > max_size {
                    let response = HttpResponse::PayloadTooLarge().json(serde_json::json!({
                        "success": false,
                        "error": format!("Request size {} exceeds maximum allowed size {}", length, max_size),
                    }));
                    return Ok(req.into_response(response));
                }
            }

            service.call(req).await
        })
    }
}

/// Security headers middleware
pub struct SecurityHeadersMiddleware;

impl<S> Transform<S, ServiceRequest> for SecurityHeadersMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddlewareService {
            service: Arc::new(service),
        }))
    }
}

pub struct SecurityHeadersMiddlewareService<S> {
    service: Arc<S>,
}

impl<S> Service<ServiceRequest> for SecurityHeadersMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);

        Box::pin(async move {
            let mut res = service.call(req).await?;
            let headers = res.headers_mut();

            headers.insert(header::X_CONTENT_TYPE_OPTIONS, header::HeaderValue::from_static("nosniff"));
            headers.insert(header::X_FRAME_OPTIONS, header::HeaderValue::from_static("DENY"));
            headers.insert(header::X_XSS_PROTECTION, header::HeaderValue::from_static("1; mode=block"));
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                header::HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            );
            headers.insert(
                header::REFERRER_POLICY,
                header::HeaderValue::from_static("strict-origin-when-cross-origin"),
            );

            Ok(res)
        })
    }
}

/// Request logging middleware. Tags each response with a request id and
/// persists internal errors to `error_logs`.
pub struct RequestLoggingMiddleware {
    pub db_service: Arc<DatabaseService>,
}

impl<S> Transform<S, ServiceRequest> for RequestLoggingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddlewareService {
            service: Arc::new(service),
            db_service: Arc::clone(&self.db_service),
        }))
    }
}

pub struct RequestLoggingMiddlewareService<S> {
    service: Arc<S>,
    db_service: Arc<DatabaseService>,
}

impl<S> Service<ServiceRequest> for RequestLoggingMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let db_service = Arc::clone(&self.db_service);
        let start_time = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let remote_addr = req.connection_info().peer_addr().unwrap_or("unknown").to_string();

        Box::pin(async move {
            let result = service.call(req).await;
            let duration_ms = start_time.elapsed().as_millis();

            let mut res = match result {
                Ok(res) => res,
                Err(err) => {
                    log::error!("{} {} failed after {}ms from {}: {}", method, path, duration_ms, remote_addr, err);
                    return Err(err);
                }
            };

            let status = res.status().as_u16();
            utils::logging::log_request(&method, &path, status, duration_ms, &remote_addr);

            if res.status().is_server_error() {
                let message = res
                    .response()
                    .error()
                    .map(|e| match e.as_error::<AppError>() {
                        Some(app_error) => app_error.to_string(),
                        None => e.to_string(),
                    })
                    .unwrap_or_else(|| format!("HTTP {}", status));
                let user_id = res
                    .request()
                    .extensions()
                    .get::<Claims>()
                    .and_then(|c| Uuid::parse_str(&c.sub).ok());
                let details = serde_json::json!({ "method": method, "path": path, "status": status });
                let request_id = request_id.clone();

                tokio::spawn(async move {
                    if let Err(e) = utils::log_internal_error(
                        db_service,
                        "ERROR",
                        "http",
                        &message,
                        Some(details),
                        Some(&request_id),
                        user_id,
                    )
                    .await
                    {
                        log::warn!("Could not persist error log: {}", e);
                    }
                });
            }

            if let Ok(value) = header::HeaderValue::from_str(&request_id) {
                res.headers_mut().insert(header::HeaderName::from_static(REQUEST_ID_HEADER), value);
            }

            Ok(res)
        })
    }
}
