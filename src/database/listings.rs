use tokio_postgres::Row;
use uuid::Uuid;

use super::{enum_column, DatabaseService, SqlParams, UpdateBuilder, WhereClause};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateListingRequest, Listing, ListingQuery, ListingSort, ListingStatus, TransactionStatus, UpdateListingRequest,
};
use crate::utils::{like_pattern, non_blank, SortOrder};

const LISTING_FROM: &str = " FROM material_listings l \
     JOIN users u ON u.id = l.seller_id \
     JOIN materials m ON m.id = l.material_id \
     JOIN material_categories c ON c.id = m.category_id";

const LISTING_COLUMNS: &str = "SELECT l.id, l.seller_id, u.username AS seller_username, l.material_id, \
     m.name AS material_name, m.category_id, c.name AS category_name, l.title, l.description, \
     l.quantity_total, l.quantity_available, l.unit, l.price_per_unit, l.currency, l.location, \
     l.available_from, l.available_until, l.status, l.is_active, l.created_at, l.updated_at";

impl DatabaseService {
    /// Search listings. Without an explicit status only active ones are
    /// returned.
    pub async fn list_listings(
        &self,
        query: &ListingQuery,
        sort: ListingSort,
        order: SortOrder,
    ) -> AppResult<(Vec<Listing>, i64)> {
        let mut params = SqlParams::new();
        let mut filter = WhereClause::new();

        let status = query.status.unwrap_or(ListingStatus::Active);
        let p = params.push(status.as_str().to_string());
        filter.push(format!("l.status = {}", p));

        if let Some(material_id) = query.material_id {
            let p = params.push(material_id);
            filter.push(format!("l.material_id = {}", p));
        }
        if let Some(category_id) = query.category_id {
            let p = params.push(category_id);
            filter.push(format!("m.category_id = {}", p));
        }
        if let Some(seller_id) = query.seller_id {
            let p = params.push(seller_id);
            filter.push(format!("l.seller_id = {}", p));
        }
        if let Some(location) = non_blank(query.location.as_deref()) {
            let p = params.push(like_pattern(&location));
            filter.push(format!("l.location ILIKE {}", p));
        }
        if let Some(search) = non_blank(query.search.as_deref()) {
            let p = params.push(like_pattern(&search));
            filter.push(format!("(l.title ILIKE {p} OR l.description ILIKE {p})"));
        }
        if let Some(min_price) = query.min_price {
            let p = params.push(min_price);
            filter.push(format!("l.price_per_unit >= {}", p));
        }
        if let Some(max_price) = query.max_price {
            let p = params.push(max_price);
            filter.push(format!("l.price_per_unit <= {}", p));
        }
        if let Some(min_quantity) = query.min_quantity {
            let p = params.push(min_quantity);
            filter.push(format!("l.quantity_available >= {}", p));
        }

        let where_sql = filter.to_sql();
        let total = self
            .count_dynamic(&format!("SELECT COUNT(*){}{}", LISTING_FROM, where_sql), &params)
            .await?;

        let page = query.pagination();
        let limit = params.push(page.limit() as i64);
        let offset = params.push(page.offset());
        let sql = format!(
            "{}{}{} ORDER BY {} {}, l.id LIMIT {} OFFSET {}",
            LISTING_COLUMNS,
            LISTING_FROM,
            where_sql,
            sort.column(),
            order.as_sql(),
            limit,
            offset
        );

        let listings = self
            .query_dynamic(&sql, &params)
            .await?
            .iter()
            .map(Self::row_to_listing)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((listings, total))
    }

    pub async fn get_listing(&self, id: &Uuid) -> AppResult<Option<Listing>> {
        let client = self.get_client().await?;

        let sql = format!("{}{} WHERE l.id = $1", LISTING_COLUMNS, LISTING_FROM);
        client
            .query_opt(sql.as_str(), &[id])
            .await?
            .map(|row| Self::row_to_listing(&row))
            .transpose()
    }

    /// Every listing of a seller, whatever its status
    pub async fn list_seller_listings(&self, seller_id: &Uuid) -> AppResult<Vec<Listing>> {
        let client = self.get_client().await?;

        let sql = format!(
            "{}{} WHERE l.seller_id = $1 ORDER BY l.created_at DESC",
            LISTING_COLUMNS, LISTING_FROM
        );
        client
            .query(sql.as_str(), &[seller_id])
            .await?
            .iter()
            .map(Self::row_to_listing)
            .collect()
    }

    pub async fn create_listing(&self, seller_id: &Uuid, req: &CreateListingRequest) -> AppResult<Uuid> {
        let client = self.get_client().await?;

        let currency = req.currency.clone().unwrap_or_else(|| "EUR".to_string());
        let row = client
            .query_one(
                "INSERT INTO material_listings
                    (seller_id, material_id, title, description, quantity_total, quantity_available,
                     unit, price_per_unit, currency, location, available_from, available_until)
                 VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $9, $10, $11)
                 RETURNING id",
                &[
                    seller_id,
                    &req.material_id,
                    &req.title,
                    &req.description,
                    &req.quantity,
                    &req.unit,
                    &req.price_per_unit,
                    &currency,
                    &req.location,
                    &req.available_from,
                    &req.available_until,
                ],
            )
            .await?;

        Ok(row.get(0))
    }

    /// Apply a partial update. A new quantity moves the total and the
    /// available amount by the same delta and re-derives active/sold.
    ///
    /// The delta is checked against the row as it stands when the UPDATE
    /// runs, so stock reserved after the caller read the listing is never
    /// handed out twice. Returns false when no row matched.
    pub async fn update_listing(&self, id: Uuid, req: UpdateListingRequest) -> AppResult<bool> {
        let mut update = UpdateBuilder::new("material_listings");
        update
            .set("material_id", req.material_id)
            .set("title", req.title)
            .set("description", req.description)
            .set("unit", req.unit)
            .set("price_per_unit", req.price_per_unit)
            .set("currency", req.currency)
            .set("location", req.location)
            .set("available_from", req.available_from)
            .set("available_until", req.available_until);

        if let Some(quantity) = req.quantity {
            let q = update.bind(quantity);
            let available = format!("ROUND((quantity_available + ({q} - quantity_total))::numeric, 6)");
            update
                .set_expr(format!("quantity_available = {available}::double precision"))
                .set_expr(format!("quantity_total = {q}"))
                .set_expr(format!(
                    "status = CASE WHEN status = 'withdrawn' THEN status \
                     WHEN {available} > 0 THEN 'active' \
                     ELSE 'sold' END"
                ))
                .guard(format!("{available} >= 0"));
        }
        update.touch("updated_at = NOW()");

        if !update.has_changes() {
            return Ok(self.get_listing(&id).await?.is_some());
        }

        let (sql, params) = update.build(id, Some("id"));
        Ok(self.query_opt_dynamic(&sql, &params).await?.is_some())
    }

    /// Take a listing off the market unless an open transaction still holds
    /// part of its quantity.
    ///
    /// The listing row is locked with the same `FOR UPDATE` a purchase takes,
    /// so no purchase can commit between the check and the update.
    /// Returns false when the listing does not exist.
    pub async fn withdraw_listing(&self, id: &Uuid) -> AppResult<bool> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let locked = tx
            .query_opt("SELECT id FROM material_listings WHERE id = $1 FOR UPDATE", &[id])
            .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let open: i64 = tx
            .query_one(
                "SELECT COUNT(*) FROM transactions WHERE listing_id = $1 AND status = ANY($2)",
                &[id, &TransactionStatus::holding()],
            )
            .await?
            .get(0);
        if open > 0 {
            return Err(AppError::conflict(format!(
                "Listing has {} open transaction(s) and cannot be withdrawn",
                open
            )));
        }

        tx.execute(
            "UPDATE material_listings SET status = 'withdrawn', is_active = false, updated_at = NOW()
             WHERE id = $1",
            &[id],
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    fn row_to_listing(row: &Row) -> AppResult<Listing> {
        Ok(Listing {
            id: row.get("id"),
            seller_id: row.get("seller_id"),
            seller_username: row.get("seller_username"),
            material_id: row.get("material_id"),
            material_name: row.get("material_name"),
            category_id: row.get("category_id"),
            category_name: row.get("category_name"),
            title: row.get("title"),
            description: row.get("description"),
            quantity_total: row.get("quantity_total"),
            quantity_available: row.get("quantity_available"),
            unit: row.get("unit"),
            price_per_unit: row.get("price_per_unit"),
            currency: row.get("currency"),
            location: row.get("location"),
            available_from: row.get("available_from"),
            available_until: row.get("available_until"),
            status: enum_column(row, "status")?,
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
