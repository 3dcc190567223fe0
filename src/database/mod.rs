use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

mod listings;
mod materials;
mod messages;
pub mod query;
mod reports;
mod sessions;
mod supply_chains;
mod transactions;
mod transport;
mod users;

pub use query::{SqlParams, UpdateBuilder, WhereClause};

/// Schema applied at startup; the same file is what the migrate binary runs.
pub const INITIAL_SCHEMA: &str = include_str!("../../migrations/V1__initial_schema.sql");

/// Database connection pool
pub type DbPool = Pool;

/// Database service
pub struct DatabaseService {
    pool: DbPool,
}

impl DatabaseService {
    /// Create a new database service and check that the database answers
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        let service = Self::connect_lazy(config)?;

        let client = service.get_client().await?;
        client.execute("SELECT 1", &[]).await?;

        log::info!("Database connection established");

        Ok(service)
    }

    /// Build the pool without opening a connection. Connections are made on
    /// first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> AppResult<Self> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: config.max_connections,
            timeouts: Timeouts {
                wait: Some(Duration::from_secs(config.connect_timeout_seconds)),
                create: Some(Duration::from_secs(config.connect_timeout_seconds)),
                recycle: Some(Duration::from_secs(config.idle_timeout_seconds)),
            },
            ..PoolConfig::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AppError::internal(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Get a database client from the pool
    pub async fn get_client(&self) -> AppResult<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }

    /// Whether the database currently answers a trivial query
    pub async fn ping(&self) -> bool {
        match self.get_client().await {
            Ok(client) => client.execute("SELECT 1", &[]).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Create every table and index that does not exist yet
    pub async fn init_schema(&self) -> AppResult<()> {
        let client = self.get_client().await?;
        client.batch_execute(INITIAL_SCHEMA).await?;

        log::info!("Database schema initialized");
        Ok(())
    }

    /// Insert an error log record
    pub async fn insert_error_log(
        &self,
        severity: &str,
        category: &str,
        message: &str,
        details: Option<serde_json::Value>,
        request_id: Option<&str>,
        user_id: Option<Uuid>,
    ) -> AppResult<Uuid> {
        let client = self.get_client().await?;

        let id = Uuid::new_v4();
        client
            .execute(
                "INSERT INTO error_logs (id, severity, category, message, details, request_id, user_id)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[&id, &severity, &category, &message, &details, &request_id, &user_id],
            )
            .await?;

        Ok(id)
    }

    /// Run a dynamically assembled query
    pub(crate) async fn query_dynamic(&self, sql: &str, params: &SqlParams) -> AppResult<Vec<Row>> {
        let client = self.get_client().await?;
        Ok(client.query(sql, &params.as_refs()).await?)
    }

    /// Run a dynamically assembled statement expected to yield at most one row
    pub(crate) async fn query_opt_dynamic(&self, sql: &str, params: &SqlParams) -> AppResult<Option<Row>> {
        let client = self.get_client().await?;
        Ok(client.query_opt(sql, &params.as_refs()).await?)
    }

    /// Count rows for a dynamically assembled query
    pub(crate) async fn count_dynamic(&self, sql: &str, params: &SqlParams) -> AppResult<i64> {
        let client = self.get_client().await?;
        let row = client.query_one(sql, &params.as_refs()).await?;
        Ok(row.get(0))
    }
}

/// Read a text column into one of the model enums
pub(crate) fn enum_column<T>(row: &Row, column: &str) -> AppResult<T>
where
    T: FromStr<Err = String>,
{
    let raw: &str = row.get(column);
    raw.parse()
        .map_err(|e: String| AppError::internal(format!("Corrupt {} column: {}", column, e)))
}
