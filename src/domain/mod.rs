//! Domain model: value objects, entities and the rules that act on them.
//!
//! Nothing in here performs I/O. Storage and delivery of notifications are
//! reached through the traits in [`ports`].

pub mod geo;
pub mod money;
pub mod notification;
pub mod order;
pub mod ports;
pub mod settings;
pub mod settlement;
pub mod snapshot;
pub mod vendor;
pub mod wallet;
