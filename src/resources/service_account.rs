//! ServiceAccount generation.
//!
//! KeyDB pods never talk to the Kubernetes API; the account only gives them
//! an identity of their own instead of the namespace default.

use k8s_openapi::api::core::v1::ServiceAccount;

use crate::controller::error::Result;
use crate::crd::KeyDb;
use crate::resources::common::{child_metadata, workload_name};

/// Generate the ServiceAccount used by the KeyDB pods.
pub fn generate_service_account(resource: &KeyDb) -> Result<ServiceAccount> {
    Ok(ServiceAccount {
        metadata: child_metadata(resource, workload_name(resource))?,
        ..Default::default()
    })
}
