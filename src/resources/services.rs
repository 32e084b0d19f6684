//! Service generation for KeyDB.
//!
//! Creates two services:
//! - **Client Service**: Load-balanced endpoint that also publishes unready pods
//! - **Headless Service**: Stable per-pod DNS names for the StatefulSet

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};

use crate::controller::error::Result;
use crate::crd::{DEFAULT_PORT, KeyDb};
use crate::resources::common::{
    child_metadata, client_service_name, headless_service_name, standard_labels,
};

/// Generate both Services, client first.
pub fn generate_services(resource: &KeyDb) -> Result<Vec<Service>> {
    Ok(vec![
        generate_client_service(resource)?,
        generate_headless_service(resource)?,
    ])
}

/// Generate the client Service.
///
/// `publishNotReadyAddresses` lets peers resolve each other before they pass
/// their readiness probes, which in turn depend on the peers.
pub fn generate_client_service(resource: &KeyDb) -> Result<Service> {
    Ok(Service {
        metadata: child_metadata(resource, client_service_name(resource))?,
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            publish_not_ready_addresses: Some(true),
            selector: Some(standard_labels(resource)),
            ports: Some(vec![keydb_port()]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Generate the headless Service.
///
/// The headless service provides:
/// - DNS records for each pod (pod-0.name-headless.ns.svc.cluster.local)
/// - No load balancing (direct pod access)
pub fn generate_headless_service(resource: &KeyDb) -> Result<Service> {
    Ok(Service {
        metadata: child_metadata(resource, headless_service_name(resource))?,
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            selector: Some(standard_labels(resource)),
            ports: Some(vec![keydb_port()]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn keydb_port() -> ServicePort {
    ServicePort {
        name: Some("redis".to_string()),
        port: DEFAULT_PORT,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;
    use crate::crd::KeyDbSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn test_resource(name: &str) -> KeyDb {
        KeyDb {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                uid: Some("test-uid".to_string()),
                ..Default::default()
            },
            spec: KeyDbSpec::default(),
            status: None,
        }
    }

    #[test]
    fn test_generate_services_order() {
        let services = generate_services(&test_resource("cache")).unwrap();
        let names: Vec<_> = services
            .iter()
            .map(|s| s.metadata.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["cache-svc", "cache-headless"]);
    }

    #[test]
    fn test_generate_client_service() {
        let svc = generate_client_service(&test_resource("cache")).unwrap();

        assert_eq!(svc.metadata.name, Some("cache-svc".to_string()));
        assert_eq!(svc.metadata.namespace, Some("default".to_string()));

        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_, Some("ClusterIP".to_string()));
        assert_eq!(spec.cluster_ip, None);
        assert_eq!(spec.publish_not_ready_addresses, Some(true));

        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports.first().unwrap().name, Some("redis".to_string()));
        assert_eq!(ports.first().unwrap().port, 6379);
    }

    #[test]
    fn test_generate_headless_service() {
        let svc = generate_headless_service(&test_resource("cache")).unwrap();

        assert_eq!(svc.metadata.name, Some("cache-headless".to_string()));
        let spec = svc.spec.unwrap();
        assert_eq!(spec.cluster_ip, Some("None".to_string()));
        assert_eq!(
            spec.selector.unwrap().get("apps"),
            Some(&"cache".to_string())
        );
    }

    #[test]
    fn test_service_owner_reference() {
        let svc = generate_headless_service(&test_resource("cache")).unwrap();
        let owners = svc.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "KeyDb");
        assert_eq!(owners[0].uid, "test-uid");
    }
}
