//! Order dispatch pipeline
//!
//! validator → location → fees → pos → delivery → ledger, driven by
//! [`Dispatcher`]. Each step is a small type over one client trait so it
//! can be exercised with in-memory fakes.

pub mod delivery;
pub mod fees;
pub mod ledger;
pub mod location;
pub mod orchestrator;
pub mod pos;
pub mod validator;

pub use orchestrator::{DispatchOutcome, Dispatcher};

/// Progress of one dispatch, logged as it advances
///
/// ```text
/// Received → LocationResolved → FeeResolved → PosCreated → PosPaid
///          → DeliveryCreated | DeliverySkipped → Audited
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Received,
    LocationResolved,
    FeeResolved,
    PosCreated,
    PosPaid,
    DeliveryCreated,
    DeliverySkipped,
    Audited,
}

pub(crate) fn transition(order_id: &str, stage: Stage) {
    tracing::info!(order_id, stage = ?stage, "Dispatch stage");
}
