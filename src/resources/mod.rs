//! Resource generation module.
//!
//! Pure functions producing the Kubernetes objects owned by a KeyDb.
//!
//! ## Resources Generated
//!
//! | Resource | Name | Purpose |
//! |----------|------|---------|
//! | Service | `<name>-svc` | Client endpoint (publishNotReadyAddresses) |
//! | Service | `<name>-headless` | Stable per-pod DNS |
//! | ConfigMap | `<name>-config` | `keydb.conf` with replication directives |
//! | ConfigMap | `<name>-healthz` | Probe scripts |
//! | Secret | `<name>-secret` | Authoritative password |
//! | ServiceAccount | `<name>` | Pod identity |
//! | StatefulSet | `<name>` | KeyDB pods and their volumes |

pub mod common;
pub mod configmap;
pub mod secret;
pub mod service_account;
pub mod services;
pub mod statefulset;
pub mod topology;

pub use common::{owner_reference, standard_labels};
pub use topology::normalize_address;
