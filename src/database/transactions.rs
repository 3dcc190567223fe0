use tokio_postgres::Row;
use uuid::Uuid;

use super::{enum_column, DatabaseService, SqlParams, WhereClause};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateTransactionRequest, ListingStock, PartyRole, Transaction, TransactionQuery, TransactionStatus,
};

const TRANSACTION_SELECT: &str = "SELECT t.id, t.listing_id, l.title AS listing_title, t.buyer_id, t.seller_id, \
     t.quantity, t.unit, t.price_per_unit, t.total_price, t.currency, t.status, t.notes, \
     t.created_at, t.updated_at, t.completed_at \
     FROM transactions t JOIN material_listings l ON l.id = t.listing_id";

impl DatabaseService {
    /// Open a purchase and reserve its quantity on the listing.
    ///
    /// The listing row is locked for the duration so two buyers can never
    /// take the same stock; the listing turns `sold` once nothing is left.
    /// Stock arithmetic is rounded to six decimals so repeated fractional
    /// purchases do not leave float dust behind.
    pub async fn create_transaction(&self, buyer_id: &Uuid, req: &CreateTransactionRequest) -> AppResult<Uuid> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_opt(
                "SELECT seller_id, quantity_available, unit, price_per_unit, currency, status, is_active
                 FROM material_listings WHERE id = $1 FOR UPDATE",
                &[&req.listing_id],
            )
            .await?
            .ok_or_else(|| AppError::not_found("Listing not found"))?;

        let stock = ListingStock {
            seller_id: row.get("seller_id"),
            quantity_available: row.get("quantity_available"),
            unit: row.get("unit"),
            price_per_unit: row.get("price_per_unit"),
            currency: row.get("currency"),
            status: enum_column(&row, "status")?,
            is_active: row.get("is_active"),
        };
        stock.check_purchase(*buyer_id, req.quantity)?;

        let reserved = tx
            .execute(
                "UPDATE material_listings
                 SET quantity_available = ROUND((quantity_available - $2)::numeric, 6)::double precision,
                     status = CASE WHEN ROUND((quantity_available - $2)::numeric, 6) <= 0 THEN 'sold' ELSE status END,
                     updated_at = NOW()
                 WHERE id = $1 AND quantity_available >= $2",
                &[&req.listing_id, &req.quantity],
            )
            .await?;
        if reserved == 0 {
            return Err(AppError::conflict("Insufficient quantity available"));
        }

        let total_price = req.quantity * stock.price_per_unit;
        let row = tx
            .query_one(
                "INSERT INTO transactions
                    (listing_id, buyer_id, seller_id, quantity, unit, price_per_unit, total_price, currency, notes)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 RETURNING id",
                &[
                    &req.listing_id,
                    buyer_id,
                    &stock.seller_id,
                    &req.quantity,
                    &stock.unit,
                    &stock.price_per_unit,
                    &total_price,
                    &stock.currency,
                    &req.notes,
                ],
            )
            .await?;

        tx.commit().await?;
        Ok(row.get(0))
    }

    pub async fn get_transaction(&self, id: &Uuid) -> AppResult<Option<Transaction>> {
        let client = self.get_client().await?;

        let sql = format!("{} WHERE t.id = $1", TRANSACTION_SELECT);
        client
            .query_opt(sql.as_str(), &[id])
            .await?
            .map(|row| Self::row_to_transaction(&row))
            .transpose()
    }

    /// Page through the transactions a user takes part in
    pub async fn list_user_transactions(
        &self,
        user_id: &Uuid,
        query: &TransactionQuery,
    ) -> AppResult<(Vec<Transaction>, i64)> {
        let mut params = SqlParams::new();
        let mut filter = WhereClause::new();

        let p = params.push(*user_id);
        match query.role {
            Some(PartyRole::Buyer) => filter.push(format!("t.buyer_id = {}", p)),
            Some(PartyRole::Seller) => filter.push(format!("t.seller_id = {}", p)),
            None => filter.push(format!("(t.buyer_id = {p} OR t.seller_id = {p})")),
        };
        if let Some(status) = query.status {
            let p = params.push(status.as_str().to_string());
            filter.push(format!("t.status = {}", p));
        }

        let where_sql = filter.to_sql();
        let total = self
            .count_dynamic(&format!("SELECT COUNT(*) FROM transactions t{}", where_sql), &params)
            .await?;

        let page = query.pagination();
        let limit = params.push(page.limit() as i64);
        let offset = params.push(page.offset());
        let sql = format!(
            "{}{} ORDER BY t.created_at DESC LIMIT {} OFFSET {}",
            TRANSACTION_SELECT, where_sql, limit, offset
        );

        let transactions = self
            .query_dynamic(&sql, &params)
            .await?
            .iter()
            .map(Self::row_to_transaction)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((transactions, total))
    }

    /// Move a transaction from `from` to `to`. When `to` releases the
    /// reserved quantity it goes back to the listing and any transport that
    /// has not been picked up yet is cancelled.
    ///
    /// Returns false if the transaction was no longer in `from`.
    pub async fn update_transaction_status(
        &self,
        id: &Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> AppResult<bool> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let completed = to == TransactionStatus::Completed;
        let row = tx
            .query_opt(
                "UPDATE transactions
                 SET status = $3,
                     completed_at = CASE WHEN $4 THEN NOW() ELSE completed_at END,
                     updated_at = NOW()
                 WHERE id = $1 AND status = $2
                 RETURNING listing_id, quantity",
                &[id, &from.as_str(), &to.as_str(), &completed],
            )
            .await?;

        let Some(row) = row else {
            return Ok(false);
        };

        if to.releases_quantity() {
            let listing_id: Uuid = row.get("listing_id");
            let quantity: f64 = row.get("quantity");
            tx.execute(
                "UPDATE material_listings
                 SET quantity_available = LEAST(quantity_total, ROUND((quantity_available + $2)::numeric, 6)::double precision),
                     status = CASE WHEN status = 'sold' THEN 'active' ELSE status END,
                     updated_at = NOW()
                 WHERE id = $1",
                &[&listing_id, &quantity],
            )
            .await?;

            let dropped = tx
                .execute(
                    "UPDATE transport_requests SET status = 'cancelled', updated_at = NOW()
                     WHERE transaction_id = $1 AND status IN ('requested', 'assigned')",
                    &[id],
                )
                .await?;
            if dropped > 0 {
                log::info!("Cancelled {} transport request(s) of transaction {}", dropped, id);
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    pub(crate) fn row_to_transaction(row: &Row) -> AppResult<Transaction> {
        Ok(Transaction {
            id: row.get("id"),
            listing_id: row.get("listing_id"),
            listing_title: row.get("listing_title"),
            buyer_id: row.get("buyer_id"),
            seller_id: row.get("seller_id"),
            quantity: row.get("quantity"),
            unit: row.get("unit"),
            price_per_unit: row.get("price_per_unit"),
            total_price: row.get("total_price"),
            currency: row.get("currency"),
            status: enum_column(row, "status")?,
            notes: row.get("notes"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            completed_at: row.get("completed_at"),
        })
    }
}
