//! Domain models for the retail transfer platform

mod branch;
mod discrepancy;
mod event;
mod receipt;
mod shipment;
mod stock;
mod transfer;

pub use branch::*;
pub use discrepancy::*;
pub use event::*;
pub use receipt::*;
pub use shipment::*;
pub use stock::*;
pub use transfer::*;
