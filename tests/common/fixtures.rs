#![allow(dead_code)]

//! Test fixtures and builder patterns for KeyDb.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use keydb_operator::crd::{KeyDb, KeyDbSpec, PersistenceSpec, ReplicationMode, ReplicationSpec};

/// Builder for creating KeyDb test fixtures.
///
/// # Example
/// ```ignore
/// let resource = KeyDbBuilder::new("cache")
///     .namespace("prod")
///     .replicas(3)
///     .master_master(&["a", "b.ns"])
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct KeyDbBuilder {
    name: String,
    namespace: Option<String>,
    uid: Option<String>,
    generation: Option<i64>,
    spec: KeyDbSpec,
}

impl KeyDbBuilder {
    /// Create a new builder with the given resource name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uid: Some(format!("test-uid-{name}")),
            name,
            namespace: Some("default".to_string()),
            generation: Some(1),
            spec: KeyDbSpec::default(),
        }
    }

    /// Set the namespace for the resource.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Drop the namespace (for testing missing-field errors).
    pub fn without_namespace(mut self) -> Self {
        self.namespace = None;
        self
    }

    /// Drop the UID (for testing owner reference errors).
    pub fn without_uid(mut self) -> Self {
        self.uid = None;
        self
    }

    /// Set the generation.
    pub fn generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.spec.image = image.into();
        self
    }

    pub fn replicas(mut self, replicas: i32) -> Self {
        self.spec.replicas = replicas;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.spec.password = Some(password.into());
        self
    }

    /// Enable replication in `mode` with the given peers on port 6379.
    pub fn replication(mut self, mode: ReplicationMode, peers: &[&str]) -> Self {
        self.spec.replication = ReplicationSpec {
            enabled: true,
            mode,
            domain: peers.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        };
        self
    }

    pub fn master_master(self, peers: &[&str]) -> Self {
        self.replication(ReplicationMode::MasterMaster, peers)
    }

    pub fn master_replica(self, peers: &[&str]) -> Self {
        self.replication(ReplicationMode::MasterReplica, peers)
    }

    pub fn persistence(mut self, persistence: PersistenceSpec) -> Self {
        self.spec.persistence = persistence;
        self
    }

    /// Build the KeyDb.
    pub fn build(self) -> KeyDb {
        KeyDb {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: self.namespace,
                generation: self.generation,
                uid: self.uid,
                ..Default::default()
            },
            spec: self.spec,
            status: None,
        }
    }
}

impl Default for KeyDbBuilder {
    fn default() -> Self {
        Self::new("cache")
    }
}

/// The canonical default cluster: `cache`, image `engine:1.0`, 3 replicas,
/// replication off, 1Gi persistence, no password.
pub fn default_cluster(namespace: &str) -> KeyDb {
    KeyDbBuilder::new("cache")
        .namespace(namespace)
        .image("engine:1.0")
        .replicas(3)
        .build()
}
