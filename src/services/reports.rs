use std::sync::Arc;

use crate::auth::AuthUser;
use crate::database::DatabaseService;
use crate::error::AppResult;
use crate::models::{MarketplaceReport, UserSummary};

pub struct ReportService {
    pub db: Arc<DatabaseService>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn summary(&self, caller: &AuthUser) -> AppResult<UserSummary> {
        self.db.user_summary(&caller.id).await
    }

    pub async fn marketplace(&self, caller: &AuthUser) -> AppResult<MarketplaceReport> {
        caller.require_admin()?;
        self.db.marketplace_report().await
    }
}
