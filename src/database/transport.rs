use tokio_postgres::Row;
use uuid::Uuid;

use super::{enum_column, DatabaseService};
use crate::error::{AppError, AppResult};
use crate::models::{CreateTransportRequest, TransactionStatus, TransportRequest, TransportStatus, UserRole};

const TRANSPORT_COLUMNS: &str = "tr.id, tr.transaction_id, tr.requested_by, tr.transporter_id, tr.pickup_location, \
     tr.dropoff_location, tr.pickup_date, tr.status, tr.notes, tr.created_at, tr.updated_at";

impl DatabaseService {
    pub async fn create_transport_request(
        &self,
        requested_by: &Uuid,
        req: &CreateTransportRequest,
    ) -> AppResult<Uuid> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                "INSERT INTO transport_requests
                    (transaction_id, requested_by, pickup_location, dropoff_location, pickup_date, notes)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id",
                &[
                    &req.transaction_id,
                    requested_by,
                    &req.pickup_location,
                    &req.dropoff_location,
                    &req.pickup_date,
                    &req.notes,
                ],
            )
            .await?;

        Ok(row.get(0))
    }

    pub async fn get_transport_request(&self, id: &Uuid) -> AppResult<Option<TransportRequest>> {
        let client = self.get_client().await?;

        let sql = format!("SELECT {} FROM transport_requests tr WHERE tr.id = $1", TRANSPORT_COLUMNS);
        client
            .query_opt(sql.as_str(), &[id])
            .await?
            .map(|row| Self::row_to_transport(&row))
            .transpose()
    }

    /// Requests visible to a user: admins see all, transporters see the open
    /// board plus their own jobs, everyone else sees requests on their deals.
    pub async fn list_transport_requests(&self, user_id: &Uuid, role: UserRole) -> AppResult<Vec<TransportRequest>> {
        let client = self.get_client().await?;

        let rows = match role {
            UserRole::Admin => {
                let sql = format!(
                    "SELECT {} FROM transport_requests tr ORDER BY tr.created_at DESC",
                    TRANSPORT_COLUMNS
                );
                client.query(sql.as_str(), &[]).await?
            }
            UserRole::Transporter => {
                let sql = format!(
                    "SELECT {} FROM transport_requests tr
                     WHERE tr.status = 'requested' OR tr.transporter_id = $1
                     ORDER BY tr.created_at DESC",
                    TRANSPORT_COLUMNS
                );
                client.query(sql.as_str(), &[user_id]).await?
            }
            UserRole::Producer | UserRole::Buyer => {
                let sql = format!(
                    "SELECT {} FROM transport_requests tr
                     JOIN transactions t ON t.id = tr.transaction_id
                     WHERE t.buyer_id = $1 OR t.seller_id = $1
                     ORDER BY tr.created_at DESC",
                    TRANSPORT_COLUMNS
                );
                client.query(sql.as_str(), &[user_id]).await?
            }
        };

        rows.iter().map(Self::row_to_transport).collect()
    }

    /// Claim an unassigned request. Returns false if someone else got it first.
    pub async fn assign_transport(&self, id: &Uuid, transporter_id: &Uuid) -> AppResult<bool> {
        let client = self.get_client().await?;

        let updated = client
            .execute(
                "UPDATE transport_requests
                 SET transporter_id = $2, status = 'assigned', updated_at = NOW()
                 WHERE id = $1 AND status = 'requested'",
                &[id, transporter_id],
            )
            .await?;

        Ok(updated > 0)
    }

    /// Move a request from `from` to `to` and carry pickup and delivery over
    /// to the underlying transaction.
    ///
    /// The transaction row is locked before the request row, the same order
    /// a cancellation takes them in. Progress on a rejected or cancelled deal
    /// is refused. Returns false if the request was no longer in `from`.
    pub async fn update_transport_status(
        &self,
        id: &Uuid,
        from: TransportStatus,
        to: TransportStatus,
    ) -> AppResult<bool> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let Some(row) = tx
            .query_opt(
                "SELECT t.id, t.status FROM transactions t
                 JOIN transport_requests tr ON tr.transaction_id = t.id
                 WHERE tr.id = $1
                 FOR UPDATE OF t",
                &[id],
            )
            .await?
        else {
            return Ok(false);
        };
        let transaction_id: Uuid = row.get("id");
        let deal: TransactionStatus = enum_column(&row, "status")?;
        if deal.releases_quantity() && to != TransportStatus::Cancelled {
            return Err(AppError::conflict(format!("Transaction is {}, transport cannot proceed", deal)));
        }

        let moved = tx
            .execute(
                "UPDATE transport_requests SET status = $3, updated_at = NOW()
                 WHERE id = $1 AND status = $2",
                &[id, &from.as_str(), &to.as_str()],
            )
            .await?;
        if moved == 0 {
            return Ok(false);
        }

        let follow_up = match to {
            TransportStatus::PickedUp => Some((TransactionStatus::Accepted, TransactionStatus::InTransit)),
            TransportStatus::Delivered => Some((TransactionStatus::InTransit, TransactionStatus::Delivered)),
            _ => None,
        };
        if let Some((expected, next)) = follow_up {
            let moved = tx
                .execute(
                    "UPDATE transactions SET status = $3, updated_at = NOW()
                     WHERE id = $1 AND status = $2",
                    &[&transaction_id, &expected.as_str(), &next.as_str()],
                )
                .await?;
            if moved > 0 {
                log::info!("Transaction {} moved to {} by transport {}", transaction_id, next, id);
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    fn row_to_transport(row: &Row) -> AppResult<TransportRequest> {
        Ok(TransportRequest {
            id: row.get("id"),
            transaction_id: row.get("transaction_id"),
            requested_by: row.get("requested_by"),
            transporter_id: row.get("transporter_id"),
            pickup_location: row.get("pickup_location"),
            dropoff_location: row.get("dropoff_location"),
            pickup_date: row.get("pickup_date"),
            status: enum_column(row, "status")?,
            notes: row.get("notes"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
