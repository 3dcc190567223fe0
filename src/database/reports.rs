use uuid::Uuid;

use super::DatabaseService;
use crate::error::AppResult;
use crate::models::{CategoryVolume, LabelCount, MarketplaceReport, MaterialVolume, UserSummary};

impl DatabaseService {
    /// Listing and trading figures for one user
    pub async fn user_summary(&self, user_id: &Uuid) -> AppResult<UserSummary> {
        let client = self.get_client().await?;

        let listings_by_status = client
            .query(
                "SELECT status AS label, COUNT(*) AS count FROM material_listings
                 WHERE seller_id = $1 GROUP BY status ORDER BY status",
                &[user_id],
            )
            .await?;
        let sales_by_status = client
            .query(
                "SELECT status AS label, COUNT(*) AS count FROM transactions
                 WHERE seller_id = $1 GROUP BY status ORDER BY status",
                &[user_id],
            )
            .await?;
        let purchases_by_status = client
            .query(
                "SELECT status AS label, COUNT(*) AS count FROM transactions
                 WHERE buyer_id = $1 GROUP BY status ORDER BY status",
                &[user_id],
            )
            .await?;

        let totals = client
            .query_one(
                "SELECT
                    (SELECT COALESCE(SUM(quantity_available), 0) FROM material_listings
                     WHERE seller_id = $1 AND status = 'active') AS active_listing_volume,
                    (SELECT COALESCE(SUM(total_price), 0) FROM transactions
                     WHERE seller_id = $1 AND status = 'completed') AS sales_revenue,
                    (SELECT COALESCE(SUM(total_price), 0) FROM transactions
                     WHERE buyer_id = $1 AND status = 'completed') AS purchase_spend",
                &[user_id],
            )
            .await?;

        Ok(UserSummary {
            listings_by_status: label_counts(&listings_by_status),
            active_listing_volume: totals.get("active_listing_volume"),
            sales_by_status: label_counts(&sales_by_status),
            purchases_by_status: label_counts(&purchases_by_status),
            sales_revenue: totals.get("sales_revenue"),
            purchase_spend: totals.get("purchase_spend"),
        })
    }

    /// Marketplace-wide figures
    pub async fn marketplace_report(&self) -> AppResult<MarketplaceReport> {
        let client = self.get_client().await?;

        let users_by_role = client
            .query(
                "SELECT role AS label, COUNT(*) AS count FROM users
                 WHERE is_active = true GROUP BY role ORDER BY role",
                &[],
            )
            .await?;

        let categories = client
            .query(
                "SELECT c.id, c.name, COUNT(l.id) AS active_listings,
                        COALESCE(SUM(l.quantity_available), 0) AS available_volume
                 FROM material_categories c
                 LEFT JOIN materials m ON m.category_id = c.id
                 LEFT JOIN material_listings l ON l.material_id = m.id AND l.status = 'active'
                 GROUP BY c.id, c.name
                 ORDER BY c.name",
                &[],
            )
            .await?
            .iter()
            .map(|row| CategoryVolume {
                category_id: row.get("id"),
                category_name: row.get("name"),
                active_listings: row.get("active_listings"),
                available_volume: row.get("available_volume"),
            })
            .collect();

        let completed = client
            .query_one(
                "SELECT COUNT(*) AS count, COALESCE(SUM(total_price), 0) AS value
                 FROM transactions WHERE status = 'completed'",
                &[],
            )
            .await?;

        let top_materials = client
            .query(
                "SELECT m.id, m.name, SUM(t.quantity) AS completed_volume
                 FROM transactions t
                 JOIN material_listings l ON l.id = t.listing_id
                 JOIN materials m ON m.id = l.material_id
                 WHERE t.status = 'completed'
                 GROUP BY m.id, m.name
                 ORDER BY completed_volume DESC, m.name
                 LIMIT 5",
                &[],
            )
            .await?
            .iter()
            .map(|row| MaterialVolume {
                material_id: row.get("id"),
                material_name: row.get("name"),
                completed_volume: row.get("completed_volume"),
            })
            .collect();

        Ok(MarketplaceReport {
            users_by_role: label_counts(&users_by_role),
            categories,
            completed_transactions: completed.get("count"),
            completed_value: completed.get("value"),
            top_materials,
        })
    }
}

fn label_counts(rows: &[tokio_postgres::Row]) -> Vec<LabelCount> {
    rows.iter()
        .map(|row| LabelCount {
            label: row.get("label"),
            count: row.get("count"),
        })
        .collect()
}
