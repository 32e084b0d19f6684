//! ConfigMap generation for KeyDB.
//!
//! Two bundles are produced:
//! - `<name>-config`: the `keydb.conf` the engine is started with
//! - `<name>-healthz`: shell scripts used by the liveness and readiness probes

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;

use crate::controller::error::Result;
use crate::crd::KeyDb;
use crate::resources::common::{child_metadata, config_map_name, health_config_map_name};
use crate::resources::topology::render_config;

/// Key of the configuration file inside `<name>-config`.
pub const CONFIG_FILE_KEY: &str = "keydb.conf";

const PING_READINESS_LOCAL: &str = r#"#!/bin/bash
. /opt/bitnami/scripts/keydb-env.sh
. /opt/bitnami/scripts/liblog.sh
response=$(
  timeout -s 15 $1 \
  keydb-cli \
    -h localhost \
    -a "$KEYDB_PASSWORD" \
    -p $KEYDB_PORT_NUMBER \
    ping
)
if [[ "$?" -eq "124" ]]; then
  error "Timed out"
  exit 1
fi
if [[ "$response" != "PONG" ]]; then
  error "$response"
  exit 1
fi
"#;

const PING_LIVENESS_LOCAL: &str = r#"#!/bin/bash
. /opt/bitnami/scripts/keydb-env.sh
. /opt/bitnami/scripts/liblog.sh
response=$(
  timeout -s 15 $1 \
  keydb-cli \
    -h localhost \
    -a "$KEYDB_PASSWORD" \
    -p $KEYDB_PORT_NUMBER \
    ping
)
if [[ "$?" -eq "124" ]]; then
  error "Timed out"
  exit 1
fi
responseFirstWord="$(echo "$response" | head -n1 | awk '{print $1;}')"
if [[ "$response" != "PONG" ]] && [[ "$responseFirstWord" != "LOADING" ]] && [[ "$responseFirstWord" != "MASTERDOWN" ]]; then
  error "$response"
  exit 1
fi
"#;

// The master scripts target the host `keydb-master` as the image's stock
// scripts do. No Service of that name is generated here, so they only pass
// where the deployment provides one.
const PING_READINESS_MASTER: &str = r#"#!/bin/bash
. /opt/bitnami/scripts/keydb-env.sh
. /opt/bitnami/scripts/liblog.sh
response=$(
  timeout -s 15 $1 \
  keydb-cli \
    -h keydb-master \
    -p 6379 \
    -a "$KEYDB_MASTER_PASSWORD" \
    ping
)
if [[ "$?" -eq "124" ]]; then
  error "Timed out"
  exit 1
fi
if [[ "$response" != "PONG" ]]; then
  error "$response"
  exit 1
fi
"#;

const PING_LIVENESS_MASTER: &str = r#"#!/bin/bash
. /opt/bitnami/scripts/keydb-env.sh
. /opt/bitnami/scripts/liblog.sh
response=$(
  timeout -s 15 $1 \
  keydb-cli \
    -h keydb-master \
    -p 6379 \
    -a "$KEYDB_MASTER_PASSWORD" \
    ping
)
if [[ "$?" -eq "124" ]]; then
  error "Timed out"
  exit 1
fi
responseFirstWord="$(echo "$response" | head -n1 | awk '{print $1;}')"
if [[ "$response" != "PONG" ]] && [[ "$responseFirstWord" != "LOADING" ]]; then
  error "$response"
  exit 1
fi
"#;

const PING_READINESS_LOCAL_AND_MASTER: &str = r#"#!/bin/bash
script_dir="$(dirname "$0")"
exit_status=0
"$script_dir/ping_readiness_local.sh" $1 || exit_status=$?
"$script_dir/ping_readiness_master.sh" $1 || exit_status=$?
exit $exit_status
"#;

const PING_LIVENESS_LOCAL_AND_MASTER: &str = r#"#!/bin/bash
script_dir="$(dirname "$0")"
exit_status=0
"$script_dir/ping_liveness_local.sh" $1 || exit_status=$?
"$script_dir/ping_liveness_master.sh" $1 || exit_status=$?
exit $exit_status
"#;

/// Probe script names with their contents.
pub const HEALTH_SCRIPTS: [(&str, &str); 6] = [
    ("ping_readiness_local.sh", PING_READINESS_LOCAL),
    ("ping_liveness_local.sh", PING_LIVENESS_LOCAL),
    ("ping_readiness_master.sh", PING_READINESS_MASTER),
    ("ping_liveness_master.sh", PING_LIVENESS_MASTER),
    (
        "ping_readiness_local_and_master.sh",
        PING_READINESS_LOCAL_AND_MASTER,
    ),
    (
        "ping_liveness_local_and_master.sh",
        PING_LIVENESS_LOCAL_AND_MASTER,
    ),
];

/// Generate both ConfigMaps, configuration first.
pub fn generate_config_maps(resource: &KeyDb, password: &str) -> Result<Vec<ConfigMap>> {
    Ok(vec![
        generate_keydb_config(resource, password)?,
        generate_health_scripts(resource)?,
    ])
}

/// Generate the `keydb.conf` ConfigMap.
pub fn generate_keydb_config(resource: &KeyDb, password: &str) -> Result<ConfigMap> {
    let config = render_config(&resource.spec.replication, password)?;

    Ok(ConfigMap {
        metadata: child_metadata(resource, config_map_name(resource))?,
        data: Some(BTreeMap::from([(CONFIG_FILE_KEY.to_string(), config)])),
        ..Default::default()
    })
}

/// Generate the probe script ConfigMap.
pub fn generate_health_scripts(resource: &KeyDb) -> Result<ConfigMap> {
    let data = HEALTH_SCRIPTS
        .iter()
        .map(|(name, script)| (name.to_string(), script.to_string()))
        .collect();

    Ok(ConfigMap {
        metadata: child_metadata(resource, health_config_map_name(resource))?,
        data: Some(data),
        ..Default::default()
    })
}
