//! Persistence and collaborator services for the transfer engine

pub mod branch;
pub mod discrepancy;
pub mod events;
pub mod receipt;
pub mod retry;
pub mod sequence;
pub mod shipment;
pub mod stock;
pub mod transfer;
pub mod transfer_store;

pub use branch::BranchService;
pub use discrepancy::DiscrepancyService;
pub use events::{BroadcastEventSink, EventSink};
pub use receipt::ReceiptService;
pub use retry::{with_conflict_retry, RetryPolicy};
pub use sequence::{InMemorySequenceAllocator, PgSequenceAllocator, SequenceAllocator};
pub use shipment::ShipmentService;
pub use stock::{PgStockService, StockService};
pub use transfer::{TransferFilter, TransferService};
pub use transfer_store::TransferStore;
