//! Application layer orchestrating the domain against the ports.
//!
//! `OrderEngine` is the entry point: it routes each trigger to the
//! `Dispatcher` or the `SettlementService`. Every collaborator call goes
//! through [`deadline::within`] so a stalled backend surfaces as a retryable
//! timeout instead of a hang.

pub mod deadline;
pub mod dispatcher;
pub mod engine;
pub mod settlement;
