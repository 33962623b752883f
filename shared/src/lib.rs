//! Shared types for the order dispatch service
//!
//! Domain types (commerce order schema, location configuration, fee
//! breakdown, audit record), the unified error system, and small utilities.

pub mod audit;
pub mod error;
pub mod fee;
pub mod location;
pub mod money;
pub mod order;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use audit::{DeliveryType, DispatchAuditRecord, DispatchStatus, RecordKind};
pub use fee::{FeeBreakdown, FeeSource};
pub use location::LocationConfig;
pub use order::OrderEvent;
