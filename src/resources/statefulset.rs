//! StatefulSet generation for KeyDB.
//!
//! Creates a StatefulSet with:
//! - Stable network identity via the headless service
//! - One PersistentVolumeClaim per replica (or an emptyDir when persistence is off)
//! - The generated `keydb.conf`, probe scripts and credential mounted from
//!   their ConfigMaps and Secret
//! - Liveness and readiness probes running the combined local/master scripts

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, ExecAction,
    KeyToPath, PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSecurityContext, PodSpec,
    PodTemplateSpec, Probe, SecretVolumeSource, SecurityContext, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::controller::error::{Error, Result};
use crate::crd::{DEFAULT_PORT, KeyDb};
use crate::resources::common::{
    child_metadata, config_map_name, headless_service_name, health_config_map_name, secret_name,
    standard_labels, workload_name,
};
use crate::resources::configmap::CONFIG_FILE_KEY;
use crate::resources::secret::PASSWORD_KEY;
use crate::resources::topology::{CLUSTER_DOMAIN_SUFFIX, DATA_DIR};

/// Non-root user and group of the bitnami KeyDB image.
const KEYDB_USER_ID: i64 = 1001;

const CONFIG_DIR: &str = "/opt/bitnami/keydb/etc";
const SECRETS_DIR: &str = "/opt/bitnami/keydb/secrets";
const HEALTH_DIR: &str = "/opt/bitnami/scripts/health";

const DATA_VOLUME: &str = "data";
const CONFIG_VOLUME: &str = "config";
const HEALTH_VOLUME: &str = "health";
const SECRET_VOLUME: &str = "secret";
const SCRATCH_VOLUME: &str = "empty-dir";

/// Probe timing shared by liveness and readiness.
const PROBE_INITIAL_DELAY_SECONDS: i32 = 20;
const PROBE_PERIOD_SECONDS: i32 = 5;
const PROBE_TIMEOUT_SECONDS: i32 = 5;
const PROBE_FAILURE_THRESHOLD: i32 = 5;

/// Generate the KeyDB StatefulSet.
pub fn generate_statefulset(resource: &KeyDb) -> Result<StatefulSet> {
    let labels = standard_labels(resource);

    Ok(StatefulSet {
        metadata: child_metadata(resource, workload_name(resource))?,
        spec: Some(StatefulSetSpec {
            replicas: Some(resource.spec.replicas),
            service_name: headless_service_name(resource),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: generate_pod_template(resource, &labels)?,
            volume_claim_templates: if resource.spec.persistence.enabled {
                Some(vec![generate_pvc_template(resource)])
            } else {
                None
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Generate the pod template for the StatefulSet.
fn generate_pod_template(
    resource: &KeyDb,
    labels: &BTreeMap<String, String>,
) -> Result<PodTemplateSpec> {
    Ok(PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels.clone()),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            service_account_name: Some(workload_name(resource)),
            security_context: Some(PodSecurityContext {
                fs_group: Some(KEYDB_USER_ID),
                ..Default::default()
            }),
            containers: vec![generate_keydb_container(resource)?],
            volumes: Some(generate_volumes(resource)),
            ..Default::default()
        }),
    })
}

/// Generate the main KeyDB container.
fn generate_keydb_container(resource: &KeyDb) -> Result<Container> {
    Ok(Container {
        name: "keydb".to_string(),
        image: Some(resource.spec.image.clone()),
        command: Some(vec!["/bin/bash".to_string()]),
        args: Some(vec!["-ec".to_string(), startup_script(resource)?]),
        ports: Some(vec![ContainerPort {
            container_port: DEFAULT_PORT,
            name: Some("keydb".to_string()),
            ..Default::default()
        }]),
        env: Some(generate_env_vars()),
        volume_mounts: Some(generate_volume_mounts()),
        security_context: Some(SecurityContext {
            run_as_non_root: Some(true),
            run_as_user: Some(KEYDB_USER_ID),
            run_as_group: Some(KEYDB_USER_ID),
            ..Default::default()
        }),
        liveness_probe: Some(health_probe("ping_liveness_local_and_master.sh")),
        readiness_probe: Some(health_probe("ping_readiness_local_and_master.sh")),
        ..Default::default()
    })
}

/// Build the container startup script.
///
/// Sources the bitnami environment (which resolves the `*_FILE` variables into
/// `KEYDB_PASSWORD`/`KEYDB_MASTER_PASSWORD`) and starts `keydb-server` with the
/// mounted config. Every pod except ordinal 0 is pointed at pod 0 through the
/// headless service as its initial peer.
fn startup_script(resource: &KeyDb) -> Result<String> {
    let name = workload_name(resource);
    let namespace = resource
        .metadata
        .namespace
        .as_deref()
        .ok_or_else(|| Error::MissingField(format!("metadata.namespace of KeyDb {name}")))?;
    let first_pod = format!("{name}-0");
    let initial_peer = format!(
        "{first_pod}.{}.{namespace}{CLUSTER_DOMAIN_SUFFIX}",
        headless_service_name(resource)
    );

    Ok(format!(
        r#". /opt/bitnami/scripts/keydb-env.sh
args=("{CONFIG_DIR}/{CONFIG_FILE_KEY}")
args+=("--requirepass" "$KEYDB_PASSWORD")
args+=("--masterauth" "$KEYDB_MASTER_PASSWORD")
if [[ "$HOSTNAME" != "{first_pod}" ]]; then
  args+=("--replicaof" "{initial_peer}" "{port}")
fi
exec keydb-server "${{args[@]}}"
"#,
        port = resource.spec.replication.port,
    ))
}

/// Generate environment variables.
///
/// Credentials are passed as file paths into the mounted Secret, never as values.
fn generate_env_vars() -> Vec<EnvVar> {
    let password_file = format!("{SECRETS_DIR}/{PASSWORD_KEY}");
    vec![
        EnvVar {
            name: "KEYDB_PASSWORD_FILE".to_string(),
            value: Some(password_file.clone()),
            ..Default::default()
        },
        EnvVar {
            name: "KEYDB_MASTER_PASSWORD_FILE".to_string(),
            value: Some(password_file),
            ..Default::default()
        },
        EnvVar {
            name: "KEYDB_PORT_NUMBER".to_string(),
            value: Some(DEFAULT_PORT.to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "BITNAMI_DEBUG".to_string(),
            value: Some("false".to_string()),
            ..Default::default()
        },
    ]
}

/// Exec probe running one of the combined health scripts with a 5s timeout.
fn health_probe(script: &str) -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                format!("{HEALTH_DIR}/{script} {PROBE_TIMEOUT_SECONDS}"),
            ]),
        }),
        initial_delay_seconds: Some(PROBE_INITIAL_DELAY_SECONDS),
        period_seconds: Some(PROBE_PERIOD_SECONDS),
        timeout_seconds: Some(PROBE_TIMEOUT_SECONDS),
        success_threshold: Some(1),
        failure_threshold: Some(PROBE_FAILURE_THRESHOLD),
        ..Default::default()
    }
}

/// Generate volumes for the pod.
fn generate_volumes(resource: &KeyDb) -> Vec<Volume> {
    let mut volumes = vec![
        Volume {
            name: CONFIG_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map_name(resource),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: HEALTH_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: health_config_map_name(resource),
                // Scripts are executed directly by the probes
                default_mode: Some(0o755),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: SECRET_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name(resource)),
                items: Some(vec![KeyToPath {
                    key: PASSWORD_KEY.to_string(),
                    path: PASSWORD_KEY.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: SCRATCH_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    ];

    // Without a claim template the data directory lives for the pod's lifetime
    if !resource.spec.persistence.enabled {
        volumes.push(Volume {
            name: DATA_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        });
    }

    volumes
}

/// Generate volume mounts for the container.
fn generate_volume_mounts() -> Vec<VolumeMount> {
    vec![
        VolumeMount {
            name: DATA_VOLUME.to_string(),
            mount_path: DATA_DIR.to_string(),
            ..Default::default()
        },
        VolumeMount {
            name: CONFIG_VOLUME.to_string(),
            mount_path: CONFIG_DIR.to_string(),
            ..Default::default()
        },
        VolumeMount {
            name: HEALTH_VOLUME.to_string(),
            mount_path: HEALTH_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        },
        VolumeMount {
            name: SECRET_VOLUME.to_string(),
            mount_path: SECRETS_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        },
        VolumeMount {
            name: SCRATCH_VOLUME.to_string(),
            mount_path: "/tmp".to_string(),
            sub_path: Some("tmp-dir".to_string()),
            ..Default::default()
        },
    ]
}

/// Generate the PVC template for the StatefulSet.
fn generate_pvc_template(resource: &KeyDb) -> PersistentVolumeClaim {
    let persistence = &resource.spec.persistence;

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(DATA_VOLUME.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: persistence
                .storage_class_name
                .clone()
                .filter(|class| !class.is_empty()),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(persistence.size.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
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
    use crate::crd::{KeyDbSpec, PersistenceSpec};

    fn test_resource(name: &str) -> KeyDb {
        KeyDb {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                uid: Some("test-uid".to_string()),
                ..Default::default()
            },
            spec: KeyDbSpec {
                image: "engine:1.0".to_string(),
                replicas: 3,
                ..Default::default()
            },
            status: None,
        }
    }

    fn container(sts: &StatefulSet) -> Container {
        let spec = sts.spec.as_ref().unwrap();
        spec.template.spec.as_ref().unwrap().containers[0].clone()
    }

    #[test]
    fn test_generate_statefulset() {
        let sts = generate_statefulset(&test_resource("cache")).unwrap();

        assert_eq!(sts.metadata.name, Some("cache".to_string()));
        assert_eq!(sts.metadata.namespace, Some("default".to_string()));

        let spec = sts.spec.unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(Some(spec.service_name), Some("cache-headless".to_string()));
        assert_eq!(
            spec.selector.match_labels.unwrap().get("apps"),
            Some(&"cache".to_string())
        );
        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.service_account_name, Some("cache".to_string()));
    }

    #[test]
    fn test_container_runs_as_non_root() {
        let c = container(&generate_statefulset(&test_resource("cache")).unwrap());
        assert_eq!(c.image, Some("engine:1.0".to_string()));
        let sc = c.security_context.unwrap();
        assert_eq!(sc.run_as_non_root, Some(true));
        assert_eq!(sc.run_as_user, Some(1001));
        assert_eq!(sc.run_as_group, Some(1001));
    }

    #[test]
    fn test_probes() {
        let c = container(&generate_statefulset(&test_resource("cache")).unwrap());
        for (probe, script) in [
            (c.liveness_probe.unwrap(), "ping_liveness_local_and_master.sh"),
            (c.readiness_probe.unwrap(), "ping_readiness_local_and_master.sh"),
        ] {
            assert_eq!(probe.initial_delay_seconds, Some(20));
            assert_eq!(probe.period_seconds, Some(5));
            assert_eq!(probe.timeout_seconds, Some(5));
            assert_eq!(probe.failure_threshold, Some(5));
            let command = probe.exec.unwrap().command.unwrap();
            assert_eq!(
                command[2],
                format!("/opt/bitnami/scripts/health/{script} 5")
            );
        }
    }

    #[test]
    fn test_startup_script() {
        let script = startup_script(&test_resource("cache")).unwrap();
        assert!(script.starts_with(". /opt/bitnami/scripts/keydb-env.sh\n"));
        assert!(script.contains(r#"args=("/opt/bitnami/keydb/etc/keydb.conf")"#));
        assert!(script.contains(r#"args+=("--requirepass" "$KEYDB_PASSWORD")"#));
        assert!(script.contains(r#"args+=("--masterauth" "$KEYDB_MASTER_PASSWORD")"#));
        assert!(script.contains(r#"if [[ "$HOSTNAME" != "cache-0" ]]; then"#));
        assert!(script.contains(
            r#"args+=("--replicaof" "cache-0.cache-headless.default.svc.cluster.local" "6379")"#
        ));
        assert!(script.ends_with("exec keydb-server \"${args[@]}\"\n"));
    }

    #[test]
    fn test_startup_script_requires_namespace() {
        let mut resource = test_resource("cache");
        resource.metadata.namespace = None;
        assert!(matches!(
            startup_script(&resource),
            Err(Error::MissingField(_))
        ));
    }

    #[test]
    fn test_env_vars_point_at_files() {
        let env = generate_env_vars();
        let get = |name: &str| {
            env.iter()
                .find(|e| e.name == name)
                .and_then(|e| e.value.clone())
                .unwrap()
        };
        assert_eq!(get("KEYDB_PASSWORD_FILE"), "/opt/bitnami/keydb/secrets/password");
        assert_eq!(
            get("KEYDB_MASTER_PASSWORD_FILE"),
            "/opt/bitnami/keydb/secrets/password"
        );
        assert_eq!(get("KEYDB_PORT_NUMBER"), "6379");
    }

    #[test]
    fn test_volume_mounts() {
        let mounts = generate_volume_mounts();
        let find = |name: &str| mounts.iter().find(|m| m.name == name).unwrap().clone();
        assert_eq!(find("data").mount_path, "/bitnami/keydb/data");
        assert_eq!(find("config").mount_path, "/opt/bitnami/keydb/etc");
        assert_eq!(find("health").read_only, Some(true));
        assert_eq!(find("secret").read_only, Some(true));
        assert_eq!(find("empty-dir").sub_path, Some("tmp-dir".to_string()));
    }

    #[test]
    fn test_pvc_template() {
        let mut resource = test_resource("cache");
        resource.spec.persistence = PersistenceSpec {
            enabled: true,
            size: "5Gi".to_string(),
            storage_class_name: Some("fast-ssd".to_string()),
        };
        let pvc = generate_pvc_template(&resource);

        assert_eq!(pvc.metadata.name, Some("data".to_string()));
        let spec = pvc.spec.unwrap();
        assert_eq!(spec.access_modes, Some(vec!["ReadWriteOnce".to_string()]));
        assert_eq!(spec.storage_class_name, Some("fast-ssd".to_string()));
        let requests = spec.resources.unwrap().requests.unwrap();
        assert_eq!(requests.get("storage"), Some(&Quantity("5Gi".to_string())));
    }

    #[test]
    fn test_empty_storage_class_uses_default() {
        let mut resource = test_resource("cache");
        resource.spec.persistence.storage_class_name = Some(String::new());
        let pvc = generate_pvc_template(&resource);
        assert_eq!(pvc.spec.unwrap().storage_class_name, None);
    }

    #[test]
    fn test_persistence_disabled_uses_empty_dir() {
        let mut resource = test_resource("cache");
        resource.spec.persistence.enabled = false;
        let sts = generate_statefulset(&resource).unwrap();
        let spec = sts.spec.unwrap();
        assert!(spec.volume_claim_templates.is_none());
        let volumes = spec.template.spec.unwrap().volumes.unwrap();
        let data = volumes.iter().find(|v| v.name == "data").unwrap();
        assert!(data.empty_dir.is_some());
    }
}
