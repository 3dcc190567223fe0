mod common;

use std::sync::Arc;

use agriloop_server::auth::{AuthService, AuthUser};
use agriloop_server::database::DatabaseService;
use agriloop_server::error::AppError;
use agriloop_server::models::{
    AddStageRequest, CreateCategoryRequest, CreateListingRequest, CreateMaterialRequest, CreateSupplyChainRequest,
    CreateTransactionRequest, CreateTransportRequest, ListingStatus, Material, MaterialQuery, SendMessageRequest,
    StageStatus, SupplyChainStatus, TransactionStatus, TransportStatus, UpdateListingRequest,
    UpdateSupplyChainRequest, UserRole,
};
use agriloop_server::services::{
    ListingService, MaterialService, MessageService, ReportService, SupplyChainService, TransactionService,
    TransportService, UserService,
};
use agriloop_server::utils::PaginationParams;

macro_rules! require_db {
    ($name:literal) => {
        match common::live_db().await {
            Some(db) => db,
            None => {
                println!("Skipping {}: DATABASE_URL not set or database unreachable", $name);
                return;
            }
        }
    };
}

struct Market {
    db: Arc<DatabaseService>,
    auth: Arc<AuthService>,
    users: UserService,
    materials: MaterialService,
    listings: ListingService,
    transactions: TransactionService,
    transport: TransportService,
    chains: SupplyChainService,
    messages: MessageService,
    reports: ReportService,
}

impl Market {
    fn new(db: Arc<DatabaseService>) -> Self {
        let auth = common::auth_service();
        Self {
            users: UserService::new(db.clone(), auth.clone()),
            materials: MaterialService::new(db.clone()),
            listings: ListingService::new(db.clone()),
            transactions: TransactionService::new(db.clone()),
            transport: TransportService::new(db.clone()),
            chains: SupplyChainService::new(db.clone()),
            messages: MessageService::new(db.clone()),
            reports: ReportService::new(db.clone()),
            db,
            auth,
        }
    }

    async fn account(&self, role: UserRole) -> AuthUser {
        common::register(&self.users, &self.auth, role).await
    }

    async fn material(&self) -> Material {
        let admin = common::admin();
        let category = self
            .materials
            .create_category(
                &admin,
                CreateCategoryRequest { name: common::unique("category"), description: None },
            )
            .await
            .expect("category");

        self.materials
            .create_material(
                &admin,
                CreateMaterialRequest {
                    category_id: category.id,
                    name: common::unique("material"),
                    description: Some("Test material".to_string()),
                    default_unit: "tonnes".to_string(),
                    is_hazardous: None,
                },
            )
            .await
            .expect("material")
    }

    async fn listing(&self, seller: &AuthUser, material: &Material, quantity: f64) -> uuid::Uuid {
        self.listings
            .create_listing(
                seller,
                CreateListingRequest {
                    material_id: material.id,
                    title: "Baled wheat straw".to_string(),
                    description: None,
                    quantity,
                    unit: "tonnes".to_string(),
                    price_per_unit: 50.0,
                    currency: None,
                    location: "Evora".to_string(),
                    available_from: None,
                    available_until: None,
                },
            )
            .await
            .expect("listing")
            .id
    }

    async fn set_status(&self, actor: &AuthUser, deal: uuid::Uuid, status: TransactionStatus) {
        self.transactions
            .update_status(actor, deal, status)
            .await
            .unwrap_or_else(|e| panic!("move to {}: {:?}", status, e));
    }

    async fn chain_status(&self, owner: &AuthUser, id: uuid::Uuid) -> SupplyChainStatus {
        self.chains.get_chain(owner, id).await.expect("chain").chain.status
    }

    async fn buy(&self, buyer: &AuthUser, listing_id: uuid::Uuid, quantity: f64) -> Result<uuid::Uuid, AppError> {
        self.transactions
            .create_transaction(buyer, CreateTransactionRequest { listing_id, quantity, notes: None })
            .await
            .map(|t| t.id)
    }
}

#[tokio::test]
async fn purchases_reserve_stock_until_sold_out() {
    let db = require_db!("purchases_reserve_stock_until_sold_out");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let buyer = market.account(UserRole::Buyer).await;
    let material = market.material().await;
    let listing_id = market.listing(&seller, &material, 10.0).await;

    let first = market.buy(&buyer, listing_id, 4.0).await.expect("first purchase");
    let listing = market.listings.get_listing(listing_id).await.unwrap();
    assert_eq!(listing.quantity_available, 6.0);
    assert_eq!(listing.status, ListingStatus::Active);

    let transaction = market.transactions.get_transaction(&buyer, first).await.unwrap();
    assert_eq!(transaction.total_price, 200.0);
    assert_eq!(transaction.currency, "EUR");
    assert_eq!(transaction.status, TransactionStatus::Pending);

    let err = market.buy(&buyer, listing_id, 7.0).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    market.buy(&buyer, listing_id, 6.0).await.expect("second purchase");
    let listing = market.listings.get_listing(listing_id).await.unwrap();
    assert_eq!(listing.quantity_available, 0.0);
    assert_eq!(listing.status, ListingStatus::Sold);

    let err = market.buy(&buyer, listing_id, 1.0).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
}

#[tokio::test]
async fn rejection_returns_stock_to_the_listing() {
    let db = require_db!("rejection_returns_stock_to_the_listing");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let buyer = market.account(UserRole::Buyer).await;
    let material = market.material().await;
    let listing_id = market.listing(&seller, &material, 5.0).await;

    let deal = market.buy(&buyer, listing_id, 5.0).await.expect("purchase");
    assert_eq!(
        market.listings.get_listing(listing_id).await.unwrap().status,
        ListingStatus::Sold
    );

    // Only the seller may reject
    let err = market
        .transactions
        .update_status(&buyer, deal, TransactionStatus::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{:?}", err);

    let rejected = market
        .transactions
        .update_status(&seller, deal, TransactionStatus::Rejected)
        .await
        .expect("reject");
    assert_eq!(rejected.status, TransactionStatus::Rejected);

    let listing = market.listings.get_listing(listing_id).await.unwrap();
    assert_eq!(listing.quantity_available, 5.0);
    assert_eq!(listing.status, ListingStatus::Active);

    // Terminal statuses stay terminal
    let err = market
        .transactions
        .update_status(&seller, deal, TransactionStatus::Accepted)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
}

#[tokio::test]
async fn producers_cannot_open_purchases() {
    let db = require_db!("producers_cannot_open_purchases");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let material = market.material().await;
    let listing_id = market.listing(&seller, &material, 5.0).await;

    // Producers are not buyers at all
    let err = market.buy(&seller, listing_id, 1.0).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{:?}", err);
}

#[tokio::test]
async fn listings_with_open_deals_cannot_be_withdrawn() {
    let db = require_db!("listings_with_open_deals_cannot_be_withdrawn");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let buyer = market.account(UserRole::Buyer).await;
    let material = market.material().await;
    let listing_id = market.listing(&seller, &material, 8.0).await;

    let deal = market.buy(&buyer, listing_id, 2.0).await.expect("purchase");

    let err = market.listings.withdraw_listing(&seller, listing_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    market
        .transactions
        .update_status(&buyer, deal, TransactionStatus::Cancelled)
        .await
        .expect("cancel");
    market.listings.withdraw_listing(&seller, listing_id).await.expect("withdraw");

    let listing = market.listings.get_listing(listing_id).await.unwrap();
    assert_eq!(listing.status, ListingStatus::Withdrawn);

    let err = market.buy(&buyer, listing_id, 1.0).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
}

#[tokio::test]
async fn transport_moves_the_transaction_along() {
    let db = require_db!("transport_moves_the_transaction_along");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let buyer = market.account(UserRole::Buyer).await;
    let driver = market.account(UserRole::Transporter).await;
    let material = market.material().await;
    let listing_id = market.listing(&seller, &material, 3.0).await;
    let deal = market.buy(&buyer, listing_id, 3.0).await.expect("purchase");

    let request = CreateTransportRequest {
        transaction_id: deal,
        pickup_location: "Evora".to_string(),
        dropoff_location: "Setubal".to_string(),
        pickup_date: None,
        notes: None,
    };

    // Pending deals cannot be shipped yet
    let err = market.transport.create_request(&buyer, request).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    market
        .transactions
        .update_status(&seller, deal, TransactionStatus::Accepted)
        .await
        .expect("accept");

    let transport = market
        .transport
        .create_request(
            &buyer,
            CreateTransportRequest {
                transaction_id: deal,
                pickup_location: "Evora".to_string(),
                dropoff_location: "Setubal".to_string(),
                pickup_date: None,
                notes: None,
            },
        )
        .await
        .expect("transport request");
    assert_eq!(transport.status, TransportStatus::Requested);

    let assigned = market.transport.assign(&driver, transport.id).await.expect("assign");
    assert_eq!(assigned.transporter_id, Some(driver.id));

    // Only the assigned transporter reports progress
    let err = market
        .transport
        .update_status(&buyer, transport.id, TransportStatus::PickedUp)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{:?}", err);

    market
        .transport
        .update_status(&driver, transport.id, TransportStatus::PickedUp)
        .await
        .expect("picked up");
    let transaction = market.transactions.get_transaction(&buyer, deal).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::InTransit);

    market
        .transport
        .update_status(&driver, transport.id, TransportStatus::Delivered)
        .await
        .expect("delivered");
    let transaction = market.transactions.get_transaction(&buyer, deal).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Delivered);

    let completed = market
        .transactions
        .update_status(&buyer, deal, TransactionStatus::Completed)
        .await
        .expect("complete");
    assert!(completed.completed_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn withdrawal_and_purchase_never_both_win() {
    let db = require_db!("withdrawal_and_purchase_never_both_win");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let buyer = market.account(UserRole::Buyer).await;
    let material = market.material().await;

    for round in 0..20 {
        let listing_id = market.listing(&seller, &material, 5.0).await;

        let (withdrawn, bought) = tokio::join!(
            market.listings.withdraw_listing(&seller, listing_id),
            market.buy(&buyer, listing_id, 1.0)
        );
        assert!(
            withdrawn.is_err() || bought.is_err(),
            "round {}: both the withdrawal and the purchase went through",
            round
        );

        let listing = market.listings.get_listing(listing_id).await.unwrap();
        match bought {
            Ok(_) => {
                assert_eq!(listing.status, ListingStatus::Active, "round {}", round);
                assert_eq!(listing.quantity_available, 4.0);
            }
            Err(e) => {
                assert!(matches!(e, AppError::Conflict(_)), "round {}: {:?}", round, e);
                assert_eq!(listing.status, ListingStatus::Withdrawn, "round {}", round);
            }
        }
    }
}

#[tokio::test]
async fn resizing_below_reserved_stock_is_a_conflict() {
    let db = require_db!("resizing_below_reserved_stock_is_a_conflict");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let buyer = market.account(UserRole::Buyer).await;
    let material = market.material().await;
    let listing_id = market.listing(&seller, &material, 10.0).await;

    // A stale view of the listing, read before the purchase
    market.buy(&buyer, listing_id, 7.0).await.expect("purchase");
    let shrink = || UpdateListingRequest { quantity: Some(4.0), ..Default::default() };

    assert!(!market.db.update_listing(listing_id, shrink()).await.expect("guarded update"));

    let err = market.listings.update_listing(&seller, listing_id, shrink()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    let listing = market.listings.get_listing(listing_id).await.unwrap();
    assert_eq!(listing.quantity_total, 10.0);
    assert_eq!(listing.quantity_available, 3.0);

    // Growing is always fine and keeps the reservation
    let grown = market
        .listings
        .update_listing(&seller, listing_id, UpdateListingRequest { quantity: Some(12.0), ..Default::default() })
        .await
        .expect("grow");
    assert_eq!(grown.quantity_available, 5.0);
}

#[tokio::test]
async fn fractional_purchases_leave_clean_stock() {
    let db = require_db!("fractional_purchases_leave_clean_stock");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let buyer = market.account(UserRole::Buyer).await;
    let material = market.material().await;
    let listing_id = market.listing(&seller, &material, 0.3).await;

    market.buy(&buyer, listing_id, 0.1).await.expect("first tenth");
    assert_eq!(market.listings.get_listing(listing_id).await.unwrap().quantity_available, 0.2);

    market.buy(&buyer, listing_id, 0.2).await.expect("the rest");
    let listing = market.listings.get_listing(listing_id).await.unwrap();
    assert_eq!(listing.quantity_available, 0.0);
    assert_eq!(listing.status, ListingStatus::Sold);
}

#[tokio::test]
async fn cancelling_a_deal_stops_its_transport() {
    let db = require_db!("cancelling_a_deal_stops_its_transport");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let buyer = market.account(UserRole::Buyer).await;
    let driver = market.account(UserRole::Transporter).await;
    let material = market.material().await;
    let listing_id = market.listing(&seller, &material, 3.0).await;
    let deal = market.buy(&buyer, listing_id, 3.0).await.expect("purchase");
    market.set_status(&seller, deal, TransactionStatus::Accepted).await;

    let transport = market
        .transport
        .create_request(
            &buyer,
            CreateTransportRequest {
                transaction_id: deal,
                pickup_location: "Evora".to_string(),
                dropoff_location: "Setubal".to_string(),
                pickup_date: None,
                notes: None,
            },
        )
        .await
        .expect("transport request");
    market.transport.assign(&driver, transport.id).await.expect("assign");

    market.set_status(&buyer, deal, TransactionStatus::Cancelled).await;

    let job = market.transport.get_request(&driver, transport.id).await.unwrap();
    assert_eq!(job.status, TransportStatus::Cancelled);

    let err = market
        .transport
        .update_status(&driver, transport.id, TransportStatus::PickedUp)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    // Even a job that still looks assigned cannot move a cancelled deal
    let client = market.db.get_client().await.unwrap();
    client
        .execute(
            "UPDATE transport_requests SET status = 'assigned' WHERE id = $1",
            &[&transport.id],
        )
        .await
        .unwrap();
    let err = market
        .transport
        .update_status(&driver, transport.id, TransportStatus::PickedUp)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    let transaction = market.transactions.get_transaction(&buyer, deal).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Cancelled);
    let job = market.transport.get_request(&driver, transport.id).await.unwrap();
    assert_eq!(job.status, TransportStatus::Assigned);
}

#[tokio::test]
async fn archived_chains_are_read_only() {
    let db = require_db!("archived_chains_are_read_only");
    let market = Market::new(db);

    let owner = market.account(UserRole::Buyer).await;
    let chain = market
        .chains
        .create_chain(&owner, CreateSupplyChainRequest { name: "Straw to biogas".to_string(), description: None })
        .await
        .expect("chain");

    // Status only moves forward through an update
    let err = market
        .chains
        .update_chain(
            &owner,
            chain.id,
            UpdateSupplyChainRequest { status: Some(SupplyChainStatus::Completed), ..Default::default() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    market.chains.archive_chain(&owner, chain.id).await.expect("archive");

    let err = market
        .chains
        .update_chain(
            &owner,
            chain.id,
            UpdateSupplyChainRequest {
                name: Some("Renamed".to_string()),
                status: Some(SupplyChainStatus::Planning),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    let detail = market.chains.get_chain(&owner, chain.id).await.unwrap();
    assert_eq!(detail.chain.name, "Straw to biogas");
    assert_eq!(detail.chain.status, SupplyChainStatus::Archived);
}

#[tokio::test]
async fn stage_progress_drives_the_chain_status() {
    let db = require_db!("stage_progress_drives_the_chain_status");
    let market = Market::new(db);

    let owner = market.account(UserRole::Producer).await;
    let chain = market
        .chains
        .create_chain(&owner, CreateSupplyChainRequest { name: "  Pomace loop  ".to_string(), description: None })
        .await
        .expect("chain");
    assert_eq!(chain.name, "Pomace loop");
    assert_eq!(chain.status, SupplyChainStatus::Planning);

    let stage = |name: &str| AddStageRequest { name: name.to_string(), location: None, material_id: None };
    let collect = market.chains.add_stage(&owner, chain.id, stage("Collection")).await.expect("stage 1");
    let digest = market.chains.add_stage(&owner, chain.id, stage("Digestion")).await.expect("stage 2");
    assert_eq!(digest.position, collect.position + 1);

    market.chains.update_stage(&owner, chain.id, collect.id, StageStatus::InProgress).await.unwrap();
    assert_eq!(market.chain_status(&owner, chain.id).await, SupplyChainStatus::Active);

    market.chains.update_stage(&owner, chain.id, collect.id, StageStatus::Completed).await.unwrap();
    assert_eq!(market.chain_status(&owner, chain.id).await, SupplyChainStatus::Active, "one stage is still pending");

    let err = market
        .chains
        .update_stage(&owner, chain.id, digest.id, StageStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    market.chains.update_stage(&owner, chain.id, digest.id, StageStatus::InProgress).await.unwrap();
    market.chains.update_stage(&owner, chain.id, digest.id, StageStatus::Completed).await.unwrap();
    assert_eq!(market.chain_status(&owner, chain.id).await, SupplyChainStatus::Completed);

    let err = market.chains.add_stage(&owner, chain.id, stage("Spreading")).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
}

#[tokio::test]
async fn reading_a_conversation_clears_its_unread_count() {
    let db = require_db!("reading_a_conversation_clears_its_unread_count");
    let market = Market::new(db);

    let farmer = market.account(UserRole::Producer).await;
    let plant = market.account(UserRole::Buyer).await;

    for body in ["Is the straw still available?", "We could collect on Friday"] {
        market
            .messages
            .send(&plant, SendMessageRequest { recipient_id: farmer.id, body: body.to_string(), listing_id: None })
            .await
            .expect("send");
    }

    let err = market
        .messages
        .send(&farmer, SendMessageRequest { recipient_id: farmer.id, body: "Note to self".to_string(), listing_id: None })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "{:?}", err);

    assert_eq!(market.messages.unread_count(&farmer).await.unwrap(), 2);
    assert_eq!(market.messages.unread_count(&plant).await.unwrap(), 0);

    let conversations = market.messages.conversations(&farmer).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].counterpart_id, plant.id);
    assert_eq!(conversations[0].unread_count, 2);
    assert_eq!(conversations[0].last_message, "We could collect on Friday");

    let thread = market
        .messages
        .conversation_with(&farmer, plant.id, PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(thread.items.len(), 2);
    assert_eq!(thread.items[0].body, "We could collect on Friday");

    assert_eq!(market.messages.unread_count(&farmer).await.unwrap(), 0);
    let conversations = market.messages.conversations(&farmer).await.unwrap();
    assert_eq!(conversations[0].unread_count, 0);
}

#[tokio::test]
async fn deleted_materials_leave_the_catalogue() {
    let db = require_db!("deleted_materials_leave_the_catalogue");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let material = market.material().await;

    market.materials.delete_material(&common::admin(), material.id).await.expect("delete");

    let stored = market.materials.get_material(material.id).await.unwrap();
    assert!(!stored.is_active);

    let listed = market
        .materials
        .list_materials(MaterialQuery { category_id: Some(material.category_id), ..Default::default() })
        .await
        .unwrap();
    assert!(listed.iter().all(|m| m.id != material.id));

    let err = market
        .listings
        .create_listing(
            &seller,
            CreateListingRequest {
                material_id: material.id,
                title: "Leftover stock".to_string(),
                description: None,
                quantity: 1.0,
                unit: "tonnes".to_string(),
                price_per_unit: 10.0,
                currency: None,
                location: "Evora".to_string(),
                available_from: None,
                available_until: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "{:?}", err);
}

#[tokio::test]
async fn summary_reports_completed_trade() {
    let db = require_db!("summary_reports_completed_trade");
    let market = Market::new(db);

    let seller = market.account(UserRole::Producer).await;
    let buyer = market.account(UserRole::Buyer).await;
    let material = market.material().await;
    let listing_id = market.listing(&seller, &material, 10.0).await;

    let deal = market.buy(&buyer, listing_id, 4.0).await.expect("purchase");
    market.buy(&buyer, listing_id, 1.0).await.expect("second purchase");
    market.set_status(&seller, deal, TransactionStatus::Accepted).await;
    market.set_status(&seller, deal, TransactionStatus::InTransit).await;
    market.set_status(&buyer, deal, TransactionStatus::Delivered).await;
    market.set_status(&buyer, deal, TransactionStatus::Completed).await;

    let count = |counts: &[agriloop_server::models::LabelCount], label: &str| {
        counts.iter().find(|c| c.label == label).map(|c| c.count).unwrap_or(0)
    };

    let summary = market.reports.summary(&seller).await.unwrap();
    assert_eq!(count(&summary.listings_by_status, "active"), 1);
    assert_eq!(summary.active_listing_volume, 5.0);
    assert_eq!(count(&summary.sales_by_status, "completed"), 1);
    assert_eq!(count(&summary.sales_by_status, "pending"), 1);
    assert_eq!(summary.sales_revenue, 200.0);
    assert_eq!(summary.purchase_spend, 0.0);

    let summary = market.reports.summary(&buyer).await.unwrap();
    assert!(summary.listings_by_status.is_empty());
    assert_eq!(count(&summary.purchases_by_status, "completed"), 1);
    assert_eq!(summary.purchase_spend, 200.0);
    assert_eq!(summary.sales_revenue, 0.0);
}
