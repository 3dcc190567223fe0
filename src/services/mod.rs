mod listings;
mod materials;
mod messages;
mod reports;
mod supply_chains;
mod transactions;
mod transport;
mod users;

pub use listings::{check_quantity_change, parse_sort, ListingService};
pub use materials::MaterialService;
pub use messages::MessageService;
pub use reports::ReportService;
pub use supply_chains::{check_chain_transition, check_stage_transition, SupplyChainService};
pub use transactions::{allowed_actors, check_transition, TransactionService};
pub use transport::{check_transport_transition, TransportService};
pub use users::{SessionService, UserService};
