//! Shared types and domain logic for inter-branch stock transfers
//!
//! Everything in this crate is pure: no I/O, no clock, no database. The
//! backend loads a [`workflow::TransferAggregate`], applies an operation and
//! persists the result; the WASM crate reuses [`reconciliation`] for receipt
//! previews in the browser.

pub mod error;
pub mod models;
pub mod reconciliation;
pub mod types;
pub mod validation;
pub mod workflow;

pub use error::*;
pub use models::*;
pub use types::*;
pub use workflow::{ReceiptOutcome, Resolution, TransferAggregate};
