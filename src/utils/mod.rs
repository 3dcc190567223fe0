use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() as i64 - 1) * self.limit() as i64
    }

    pub fn meta(&self, total: i64) -> PaginationMeta {
        let limit = self.limit();
        let total = total.max(0) as u64;
        PaginationMeta {
            page: self.page(),
            limit,
            total,
            total_pages: total.div_ceil(limit as u64) as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

/// Sorting direction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
            None => Ok(SortOrder::Desc),
            Some("asc") => Ok(SortOrder::Asc),
            Some("desc") => Ok(SortOrder::Desc),
            Some(other) => Err(AppError::bad_request(format!("Invalid sort order '{}'", other))),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Trim a free-text filter, treating blank input as absent
pub fn non_blank(input: Option<&str>) -> Option<String> {
    input.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Request bodies whose free text is trimmed before validation, so length
/// limits apply to the text that is stored
pub trait TrimFields {
    fn trim_fields(&mut self);
}

pub fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

pub fn trim_opt_in_place(value: &mut Option<String>) {
    if let Some(value) = value.as_mut() {
        trim_in_place(value);
    }
}

/// Escape LIKE wildcards so user input only matches literally
pub fn like_pattern(input: &str) -> String {
    let escaped = input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Mask sensitive values partially (e.g., tokens, emails, passwords)
pub fn mask_sensitive(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    // If it looks like an email, mask local part
    if let Some((local, domain)) = value.split_once('@') {
        let visible: String = local.chars().take(if local.chars().count() <= 2 { 1 } else { 2 }).collect();
        return format!("{}***@{}", visible, domain);
    }

    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return format!("{}***", chars[0]);
    }

    let start: String = chars[..4].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", start, end)
}

/// Truncate string to maximum length in characters
pub fn truncate_string(input: &str, max_len: usize) -> String {
    if input.chars().count() <= max_len {
        input.to_string()
    } else {
        let kept: String = input.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Parse a path segment as a UUID
pub fn parse_uuid(id: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::bad_request(format!("Invalid {} ID", what)))
}

fn validation_error(code: &'static str, message: &'static str) -> validator::ValidationError {
    let mut err = validator::ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Password policy: 8-128 characters with upper, lower and digit
pub fn validate_password(password: &str) -> Result<(), validator::ValidationError> {
    let len = password.chars().count();
    if len < 8 {
        return Err(validation_error("password_too_short", "Password must be at least 8 characters"));
    }
    if len > 128 {
        return Err(validation_error("password_too_long", "Password must be at most 128 characters"));
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_numeric());

    if !has_upper || !has_lower || !has_digit {
        return Err(validation_error(
            "password_too_weak",
            "Password must contain at least one uppercase letter, one lowercase letter, and one digit",
        ));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(validation_error("username_length", "Username must be 3-50 characters"));
    }
    if !username.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(validation_error("username_chars", "Username contains invalid characters"));
    }
    Ok(())
}

/// ISO 4217 style code: exactly three uppercase ASCII letters
pub fn validate_currency(currency: &str) -> Result<(), validator::ValidationError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(validation_error("currency", "Currency must be a 3-letter uppercase code"))
    }
}

/// Strictly positive, finite amount of material
pub fn validate_positive_quantity(quantity: f64) -> Result<(), validator::ValidationError> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(())
    } else {
        Err(validation_error("quantity", "Quantity must be greater than zero"))
    }
}

/// Logging helpers
pub mod logging {
    use log::{Level, LevelFilter};

    pub fn level_from_string(level: &str) -> LevelFilter {
        match level.to_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Info,
        }
    }

    pub fn level_for_status(status: u16) -> Level {
        match status {
            400..=499 => Level::Warn,
            500..=599 => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn log_request(method: &str, path: &str, status: u16, duration_ms: u128, remote_addr: &str) {
        log::log!(
            level_for_status(status),
            "{} {} {} {}ms from {}",
            method,
            path,
            status,
            duration_ms,
            remote_addr
        );
    }
}

/// Response helpers
pub mod response {
    use actix_web::HttpResponse;
    use serde::Serialize;

    use crate::models::ApiResponse;

    pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
        HttpResponse::Ok().json(ApiResponse::success(data))
    }

    pub fn created_response<T: Serialize>(data: T) -> HttpResponse {
        HttpResponse::Created().json(ApiResponse::success(data))
    }
}

const SENSITIVE_KEYS: [&str; 8] = [
    "password",
    "current_password",
    "new_password",
    "token",
    "access_token",
    "refresh_token",
    "authorization",
    "email",
];

/// Mask commonly sensitive fields before details leave the process
pub fn sanitize_details(details: serde_json::Value) -> serde_json::Value {
    match details {
        serde_json::Value::Object(mut map) => {
            for key in SENSITIVE_KEYS {
                if let Some(v) = map.get_mut(key) {
                    if let Some(s) = v.as_str() {
                        *v = serde_json::Value::String(mask_sensitive(s));
                    }
                }
            }
            serde_json::Value::Object(map)
        }
        other => serde_json::Value::String(truncate_string(&mask_sensitive(&other.to_string()), 1024)),
    }
}

/// Log internal error details to database and to logger, return the inserted error ID.
pub async fn log_internal_error(
    db: Arc<crate::database::DatabaseService>,
    severity: &str,
    category: &str,
    message: &str,
    details: Option<serde_json::Value>,
    request_id: Option<&str>,
    user_id: Option<Uuid>,
) -> Result<Uuid, AppError> {
    let sanitized_details = details.map(sanitize_details);

    log::error!(
        "[{}] {}: {} - details: {:?} request_id: {:?} user_id: {:?}",
        severity,
        category,
        message,
        sanitized_details,
        request_id,
        user_id
    );

    db.insert_error_log(severity, category, message, sanitized_details, request_id, user_id)
        .await
}
