//! Custom Resource Definitions (CRDs) for keydb-operator.
//!
//! - `KeyDb`: Deploy and manage a KeyDB replication topology

mod keydb;

pub use keydb::*;
