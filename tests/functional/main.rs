// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the KeyDb reconciler.
//!
//! These tests drive the real reconciler against an in-memory
//! `ResourceStore` WITHOUT requiring a live Kubernetes cluster.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_default_cluster_end_to_end
//! ```
//!
//! ## Test Categories
//!
//! - **Reconcile tests**: Full passes over a KeyDb, from lookup to status
//! - **Apply tests**: Create-or-update semantics of the applier

#[path = "../common/fixtures.rs"]
mod fixtures;
mod mock_store;

mod apply_tests;
