//! KeyDb Custom Resource Definition.
//!
//! Declares the desired KeyDB deployment: image, replica count, replication
//! topology, persistence and an optional initial password.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// KeyDb is a custom resource for deploying KeyDB instances.
///
/// Example:
/// ```yaml
/// apiVersion: keydb.keydb/v1
/// kind: KeyDb
/// metadata:
///   name: cache
/// spec:
///   image: bitnami/keydb:6.3.4
///   replicas: 3
///   replication:
///     enabled: true
///     mode: master-master
///     domain: ["cache-0.cache-headless", "cache-1.cache-headless"]
///     port: 6379
///   persistence:
///     enabled: true
///     size: 1Gi
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "keydb.keydb",
    version = "v1",
    kind = "KeyDb",
    plural = "keydbs",
    shortname = "kdb",
    status = "KeyDbStatus",
    namespaced,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Mode", "type":"string", "jsonPath":".spec.replication.mode"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KeyDbSpec {
    /// KeyDB container image reference.
    #[serde(default = "default_image")]
    pub image: String,

    /// Number of StatefulSet replicas (default 1).
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Replication topology.
    #[serde(default)]
    pub replication: ReplicationSpec,

    /// Persistent storage for the data directory.
    #[serde(default)]
    pub persistence: PersistenceSpec,

    /// Initial password. Only consulted while no credential Secret exists;
    /// afterwards the stored Secret is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for KeyDbSpec {
    fn default() -> Self {
        Self {
            image: default_image(),
            replicas: default_replicas(),
            replication: ReplicationSpec::default(),
            persistence: PersistenceSpec::default(),
            password: None,
        }
    }
}

fn default_image() -> String {
    "bitnami/keydb:latest".to_string()
}

fn default_replicas() -> i32 {
    1
}

/// Replication configuration.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationSpec {
    /// Enable replication. `mode` is ignored while this is false.
    #[serde(default)]
    pub enabled: bool,

    /// Replication mode.
    #[serde(default)]
    pub mode: ReplicationMode,

    /// Ordered peer host references. In `master-replica` mode only the first
    /// entry is used; in `master-master` mode every entry is a mesh peer.
    #[serde(default)]
    pub domain: Vec<String>,

    /// Port the peers listen on (default 6379).
    #[serde(default = "default_replication_port")]
    pub port: i32,
}

impl Default for ReplicationSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ReplicationMode::default(),
            domain: Vec::new(),
            port: default_replication_port(),
        }
    }
}

fn default_replication_port() -> i32 {
    DEFAULT_PORT
}

/// Replication mode.
///
/// Values other than the known ones deserialize to `Unrecognized` and produce
/// no replication directives.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ReplicationMode {
    /// No replication.
    #[default]
    Disabled,
    /// Single master, every other node replicates from the first peer.
    MasterReplica,
    /// Active-active mesh where every node replicates from every peer.
    MasterMaster,
    /// Any other value.
    #[serde(other)]
    Unrecognized,
}

impl std::fmt::Display for ReplicationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationMode::Disabled => write!(f, "disabled"),
            ReplicationMode::MasterReplica => write!(f, "master-replica"),
            ReplicationMode::MasterMaster => write!(f, "master-master"),
            ReplicationMode::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Persistence configuration for the data directory.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceSpec {
    /// Use a PersistentVolumeClaim per replica (default: true).
    /// When false the data directory is an emptyDir.
    #[serde(default = "default_persistence_enabled")]
    pub enabled: bool,

    /// Size of each PersistentVolumeClaim (default: 1Gi).
    #[serde(default = "default_storage_size")]
    pub size: String,

    /// Storage class name. If not set, uses the cluster default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

impl Default for PersistenceSpec {
    fn default() -> Self {
        Self {
            enabled: default_persistence_enabled(),
            size: default_storage_size(),
            storage_class_name: None,
        }
    }
}

fn default_persistence_enabled() -> bool {
    true
}

fn default_storage_size() -> String {
    "1Gi".to_string()
}

/// Status of a KeyDb.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyDbStatus {
    /// Current phase.
    #[serde(default)]
    pub phase: KeyDbPhase,

    /// Details of the last failure, cleared on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the phase was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,

    /// The generation most recently observed by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl KeyDbStatus {
    /// Status after a fully applied reconciliation.
    pub fn running(generation: Option<i64>) -> Self {
        Self {
            phase: KeyDbPhase::Running,
            message: None,
            last_transition_time: Some(jiff::Timestamp::now().to_string()),
            observed_generation: generation,
        }
    }

    /// Status after a reconciliation that aborted.
    pub fn failed(message: impl Into<String>, generation: Option<i64>) -> Self {
        Self {
            phase: KeyDbPhase::Failed,
            message: Some(message.into()),
            last_transition_time: Some(jiff::Timestamp::now().to_string()),
            observed_generation: generation,
        }
    }
}

/// Lifecycle phase of a KeyDb.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum KeyDbPhase {
    /// Not reconciled yet.
    #[default]
    Pending,
    /// All child resources were applied.
    Running,
    /// The last reconciliation aborted; see `message`.
    Failed,
}

impl std::fmt::Display for KeyDbPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyDbPhase::Pending => write!(f, "Pending"),
            KeyDbPhase::Running => write!(f, "Running"),
            KeyDbPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Client port of the KeyDB engine.
pub const DEFAULT_PORT: i32 = 6379;
