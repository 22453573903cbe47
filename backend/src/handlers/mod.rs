//! HTTP request handlers

pub mod branch;
pub mod discrepancy;
pub mod health;
pub mod receipt;
pub mod shipment;
pub mod transfer;

pub use branch::*;
pub use discrepancy::*;
pub use health::*;
pub use receipt::*;
pub use shipment::*;
pub use transfer::*;
