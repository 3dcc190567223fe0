use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

use agriloop_server::auth::AuthService;
use agriloop_server::config::{AppConfig, LoggingConfig};
use agriloop_server::database::DatabaseService;
use agriloop_server::handlers::{self, AppServices};
use agriloop_server::middleware::{
    AuthMiddleware, CorsMiddleware, RateLimitMiddleware, RateLimitStore, RequestLoggingMiddleware,
    RequestSizeLimitMiddleware, SecurityHeadersMiddleware,
};
use agriloop_server::utils;

/// File logging with stdout duplication; `env_logger` when the file sink fails
fn init_logging(config: &LoggingConfig) -> Option<flexi_logger::LoggerHandle> {
    let started = flexi_logger::Logger::try_with_str(&config.level).and_then(|logger| {
        logger
            .log_to_file(
                flexi_logger::FileSpec::default()
                    .directory(&config.directory)
                    .basename("agriloop")
                    .suppress_timestamp(),
            )
            .duplicate_to_stdout(flexi_logger::Duplicate::Info)
            .start()
    });

    match started {
        Ok(handle) => Some(handle),
        Err(e) => {
            env_logger::builder()
                .filter_level(utils::logging::level_from_string(&config.level))
                .format_timestamp_secs()
                .init();
            log::warn!("File logging unavailable ({}), logging to stderr", e);
            None
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let _logger = init_logging(&config.logging);

    log::info!("Starting AgriLoop server v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Listening on {}:{} with {} workers", config.server.host, config.server.port, config.server.workers);

    let db_service = match DatabaseService::new(&config.database).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            log::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db_service.init_schema().await {
        log::error!("Failed to initialize DB schema: {}", e);
        std::process::exit(1);
    }

    let auth_service = Arc::new(AuthService::new(config.auth.clone()));
    let services = AppServices::new(Arc::clone(&db_service), Arc::clone(&auth_service));
    let rate_limit_store = Arc::new(Mutex::new(RateLimitStore::new()));

    // Hourly maintenance: expired sessions, revoked tokens, idle rate-limit keys
    let sessions_bg = Arc::clone(&services.sessions);
    let db_bg = Arc::clone(&db_service);
    let store_bg = Arc::clone(&rate_limit_store);
    let window_seconds = config.security.rate_limit_window_seconds;
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;

            match sessions_bg.cleanup_expired_sessions().await {
                Ok((sessions, tokens)) => {
                    log::info!("Cleaned up {} expired sessions and {} revoked tokens", sessions, tokens)
                }
                Err(e) => {
                    let _ = utils::log_internal_error(
                        Arc::clone(&db_bg),
                        "ERROR",
                        "maintenance",
                        "Failed to clean up expired sessions",
                        Some(serde_json::json!({ "error": e.to_string() })),
                        None,
                        None,
                    )
                    .await;
                }
            }

            let dropped = store_bg.lock().await.cleanup(window_seconds);
            if dropped > 0 {
                log::debug!("Dropped {} idle rate limit keys", dropped);
            }
        }
    });

    let security = config.security.clone();

    HttpServer::new(move || {
        let services = services.clone();

        App::new()
            .app_data(web::Data::new(Arc::clone(&db_service)))
            .app_data(web::Data::new(Arc::clone(&auth_service)))
            .configure(|cfg| {
                services.register(cfg);
                handlers::configure(cfg);
            })
            // Innermost first; Compress stays outermost so the custom layers see BoxBody
            .wrap(AuthMiddleware {
                auth_service: Arc::clone(&auth_service),
                db_service: Arc::clone(&db_service),
            })
            .wrap(RateLimitMiddleware {
                store: Arc::clone(&rate_limit_store),
                max_requests: security.rate_limit_requests,
                window_seconds: security.rate_limit_window_seconds,
                auth_service: Arc::clone(&auth_service),
            })
            .wrap(RequestSizeLimitMiddleware {
                max_size: security.max_request_size_bytes,
            })
            .wrap(CorsMiddleware {
                allowed_origins: security.cors_allowed_origins.clone(),
            })
            .wrap(SecurityHeadersMiddleware)
            .wrap(RequestLoggingMiddleware {
                db_service: Arc::clone(&db_service),
            })
            .wrap(actix_middleware::Compress::default())
    })
    .bind((config.server.host.clone(), config.server.port))?
    .workers(config.server.workers)
    .keep_alive(std::time::Duration::from_secs(config.server.keep_alive_seconds))
    .client_request_timeout(std::time::Duration::from_secs(config.server.client_timeout_seconds))
    .client_disconnect_timeout(std::time::Duration::from_secs(config.server.client_shutdown_seconds))
    .max_connections(config.server.max_connections)
    .run()
    .await
}
