//! KeyDB configuration directives.
//!
//! Builds the ordered `keydb.conf` lines: a fixed base block followed by the
//! replication directives for the configured mode. Order is part of the
//! contract since the engine reads the file top to bottom at startup.

use std::net::IpAddr;

use crate::controller::error::{Error, Result};
use crate::crd::{DEFAULT_PORT, ReplicationMode, ReplicationSpec};

/// Cluster-internal DNS suffix appended to short service references.
pub const CLUSTER_DOMAIN_SUFFIX: &str = ".svc.cluster.local";

/// Data directory inside the KeyDB container.
pub const DATA_DIR: &str = "/bitnami/keydb/data";

/// Normalize a host reference to a fully-qualified cluster-internal name.
///
/// - IP literals are returned unchanged
/// - names with two or more dots are treated as already qualified
/// - `svc.ns` and bare `svc` get the cluster domain suffix
pub fn normalize_address(host: &str) -> String {
    if host.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }
    match host.matches('.').count() {
        0 | 1 => format!("{host}{CLUSTER_DOMAIN_SUFFIX}"),
        _ => host.to_string(),
    }
}

/// Directives emitted for every instance regardless of replication mode.
pub fn base_directives(password: &str) -> Vec<String> {
    vec![
        "bind 0.0.0.0 ::".to_string(),
        "protected-mode no".to_string(),
        format!("dir {DATA_DIR}"),
        format!("port {DEFAULT_PORT}"),
        "loglevel notice".to_string(),
        "appendonly yes".to_string(),
        format!("requirepass {password}"),
    ]
}

/// Replication directives for the given spec.
///
/// Returns nothing when replication is disabled or the mode is not one of the
/// known values. `master-replica` without any peer is a configuration error.
///
/// In `master-master` mode every peer gets a `replicaof` line, including the
/// local instance if it appears in the list.
pub fn replication_directives(replication: &ReplicationSpec, password: &str) -> Result<Vec<String>> {
    if !replication.enabled {
        return Ok(Vec::new());
    }

    let port = replication.port;
    let directives = match replication.mode {
        ReplicationMode::MasterReplica => {
            let master = replication.domain.first().ok_or_else(|| {
                Error::Configuration(
                    "replication.domain must name the master in master-replica mode".to_string(),
                )
            })?;
            vec![
                format!("replicaof {} {}", normalize_address(master), port),
                format!("masterauth {password}"),
                "replica-read-consistency yes".to_string(),
                "repl-diskless-sync yes".to_string(),
                "repl-diskless-sync-delay 0".to_string(),
            ]
        }
        ReplicationMode::MasterMaster => {
            let mut directives = vec![
                "active-replica yes".to_string(),
                "multi-master yes".to_string(),
                "replica-read-only no".to_string(),
                "repl-diskless-sync yes".to_string(),
                "repl-diskless-sync-delay 0".to_string(),
            ];
            for peer in &replication.domain {
                directives.push(format!("replicaof {} {}", normalize_address(peer), port));
                directives.push(format!("masterauth {password}"));
            }
            directives
        }
        ReplicationMode::Disabled | ReplicationMode::Unrecognized => Vec::new(),
    };

    Ok(directives)
}

/// Render the complete `keydb.conf`: newline-joined with a trailing newline.
pub fn render_config(replication: &ReplicationSpec, password: &str) -> Result<String> {
    let mut lines = base_directives(password);
    lines.extend(replication_directives(replication, password)?);
    Ok(lines.join("\n") + "\n")
}
