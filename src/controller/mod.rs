//! Controller module for keydb-operator.
//!
//! Contains the reconciliation loop, credential resolution, the idempotent
//! applier and the seams (`ResourceStore`, `EventSink`) the loop runs against.

pub mod apply;
pub mod context;
pub mod credentials;
pub mod error;
pub mod events;
pub mod reconciler;
pub mod store;
