//! Common resource generation utilities.
//!
//! Naming, labels, metadata and owner references shared by every child
//! resource of a KeyDb.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

use crate::controller::error::{Error, Result};
use crate::crd::KeyDb;

/// Label key carried by every child resource and used as the pod selector.
pub const APP_LABEL: &str = "apps";

/// Labels applied to all managed resources: `{"apps": <name>}`.
pub fn standard_labels(resource: &KeyDb) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), resource.name_any())])
}

/// Controller owner reference pointing back at the KeyDb.
///
/// Fails when the KeyDb has no UID, i.e. it was never persisted.
pub fn owner_reference(resource: &KeyDb) -> Result<OwnerReference> {
    resource
        .controller_owner_ref(&())
        .ok_or_else(|| Error::MissingField(format!("metadata.uid of KeyDb {}", resource.name_any())))
}

/// Metadata shared by every child: name, inherited namespace, labels, owner.
pub fn child_metadata(resource: &KeyDb, name: String) -> Result<ObjectMeta> {
    Ok(ObjectMeta {
        name: Some(name),
        namespace: resource.namespace(),
        labels: Some(standard_labels(resource)),
        owner_references: Some(vec![owner_reference(resource)?]),
        ..Default::default()
    })
}

/// Name of the load-balanced client Service.
pub fn client_service_name(resource: &KeyDb) -> String {
    format!("{}-svc", resource.name_any())
}

/// Name of the headless Service backing per-pod DNS.
pub fn headless_service_name(resource: &KeyDb) -> String {
    format!("{}-headless", resource.name_any())
}

/// Name of the ConfigMap holding `keydb.conf`.
pub fn config_map_name(resource: &KeyDb) -> String {
    format!("{}-config", resource.name_any())
}

/// Name of the ConfigMap holding the probe scripts.
pub fn health_config_map_name(resource: &KeyDb) -> String {
    format!("{}-healthz", resource.name_any())
}

/// Name of the credential Secret.
pub fn secret_name(resource: &KeyDb) -> String {
    format!("{}-secret", resource.name_any())
}

/// Name shared by the ServiceAccount and the StatefulSet.
pub fn workload_name(resource: &KeyDb) -> String {
    resource.name_any()
}
