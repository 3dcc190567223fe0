use actix_web::{web, HttpRequest};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::ClientInfo;
use crate::services::{
    ListingService, MaterialService, MessageService, ReportService, SessionService, SupplyChainService,
    TransactionService, TransportService, UserService,
};
use crate::utils::truncate_string;

pub mod auth;
pub mod listings;
pub mod materials;
pub mod messages;
pub mod reports;
pub mod supply_chains;
pub mod system;
pub mod transactions;
pub mod transport;
pub mod users;

/// Shared handles to every service, registered as app data
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub sessions: Arc<SessionService>,
    pub materials: Arc<MaterialService>,
    pub listings: Arc<ListingService>,
    pub transactions: Arc<TransactionService>,
    pub transport: Arc<TransportService>,
    pub supply_chains: Arc<SupplyChainService>,
    pub messages: Arc<MessageService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    pub fn new(db: Arc<crate::database::DatabaseService>, auth: Arc<crate::auth::AuthService>) -> Self {
        Self {
            users: Arc::new(UserService::new(Arc::clone(&db), auth)),
            sessions: Arc::new(SessionService::new(Arc::clone(&db))),
            materials: Arc::new(MaterialService::new(Arc::clone(&db))),
            listings: Arc::new(ListingService::new(Arc::clone(&db))),
            transactions: Arc::new(TransactionService::new(Arc::clone(&db))),
            transport: Arc::new(TransportService::new(Arc::clone(&db))),
            supply_chains: Arc::new(SupplyChainService::new(Arc::clone(&db))),
            messages: Arc::new(MessageService::new(Arc::clone(&db))),
            reports: Arc::new(ReportService::new(db)),
        }
    }

    /// Register each service so handlers can extract `web::Data<Arc<...>>`
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(Arc::clone(&self.users)))
            .app_data(web::Data::new(Arc::clone(&self.sessions)))
            .app_data(web::Data::new(Arc::clone(&self.materials)))
            .app_data(web::Data::new(Arc::clone(&self.listings)))
            .app_data(web::Data::new(Arc::clone(&self.transactions)))
            .app_data(web::Data::new(Arc::clone(&self.transport)))
            .app_data(web::Data::new(Arc::clone(&self.supply_chains)))
            .app_data(web::Data::new(Arc::clone(&self.messages)))
            .app_data(web::Data::new(Arc::clone(&self.reports)));
    }
}

/// Route table shared by the server and the tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::bad_request(format!("Invalid request body: {}", err)).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::bad_request(format!("Invalid query string: {}", err)).into()),
    )
    .route("/health", web::get().to(system::health_check))
    .service(
        web::scope("/api")
            .route("/status", web::get().to(system::server_status))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register_user))
                    .route("/login", web::post().to(auth::login_user))
                    .route("/refresh", web::post().to(auth::refresh_token))
                    .route("/logout", web::post().to(auth::logout_user)),
            )
            .service(
                web::scope("/users")
                    .route("", web::get().to(users::list_users))
                    .route("/me", web::get().to(users::get_user_profile))
                    .route("/me", web::put().to(users::update_user_profile))
                    .route("/me", web::delete().to(users::deactivate_user))
                    .route("/me/password", web::put().to(users::change_password))
                    .route("/me/sessions", web::get().to(users::get_user_sessions))
                    .route("/me/sessions/{session_id}", web::delete().to(users::end_session))
                    .route("/{user_id}", web::get().to(users::get_public_profile))
                    .route("/{user_id}/activate", web::post().to(users::admin_activate_user))
                    .route("/{user_id}/deactivate", web::post().to(users::admin_deactivate_user)),
            )
            .service(
                web::scope("/materials")
                    .route("/categories", web::get().to(materials::list_categories))
                    .route("/categories", web::post().to(materials::create_category))
                    .route("", web::get().to(materials::list_materials))
                    .route("", web::post().to(materials::create_material))
                    .route("/{material_id}", web::get().to(materials::get_material))
                    .route("/{material_id}", web::put().to(materials::update_material))
                    .route("/{material_id}", web::delete().to(materials::delete_material)),
            )
            .service(
                web::scope("/listings")
                    .route("", web::get().to(listings::search_listings))
                    .route("", web::post().to(listings::create_listing))
                    .route("/mine", web::get().to(listings::my_listings))
                    .route("/{listing_id}", web::get().to(listings::get_listing))
                    .route("/{listing_id}", web::put().to(listings::update_listing))
                    .route("/{listing_id}", web::delete().to(listings::withdraw_listing)),
            )
            .service(
                web::scope("/transactions")
                    .route("", web::get().to(transactions::list_transactions))
                    .route("", web::post().to(transactions::create_transaction))
                    .route("/{transaction_id}", web::get().to(transactions::get_transaction))
                    .route("/{transaction_id}/status", web::patch().to(transactions::update_status)),
            )
            .service(
                web::scope("/transport")
                    .route("", web::get().to(transport::list_requests))
                    .route("", web::post().to(transport::create_request))
                    .route("/{transport_id}", web::get().to(transport::get_request))
                    .route("/{transport_id}/assign", web::post().to(transport::assign))
                    .route("/{transport_id}/status", web::patch().to(transport::update_status)),
            )
            .service(
                web::scope("/supply-chains")
                    .route("", web::get().to(supply_chains::list_chains))
                    .route("", web::post().to(supply_chains::create_chain))
                    .route("/{chain_id}", web::get().to(supply_chains::get_chain))
                    .route("/{chain_id}", web::put().to(supply_chains::update_chain))
                    .route("/{chain_id}", web::delete().to(supply_chains::archive_chain))
                    .route("/{chain_id}/participants", web::post().to(supply_chains::add_participant))
                    .route(
                        "/{chain_id}/participants/{participant_id}",
                        web::delete().to(supply_chains::remove_participant),
                    )
                    .route("/{chain_id}/stages", web::post().to(supply_chains::add_stage))
                    .route("/{chain_id}/stages/{stage_id}", web::patch().to(supply_chains::update_stage)),
            )
            .service(
                web::scope("/reports")
                    .route("/summary", web::get().to(reports::summary))
                    .route("/marketplace", web::get().to(reports::marketplace)),
            )
            .service(
                web::scope("/messages")
                    .route("", web::post().to(messages::send_message))
                    .route("/conversations", web::get().to(messages::conversations))
                    .route("/unread-count", web::get().to(messages::unread_count))
                    .route("/with/{user_id}", web::get().to(messages::conversation_with)),
            ),
    );
}

/// Caller address and agent, recorded on new sessions
pub fn client_info(req: &HttpRequest) -> ClientInfo {
    let ip_address = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|ua| truncate_string(ua, 500));

    ClientInfo { ip_address, user_agent }
}
