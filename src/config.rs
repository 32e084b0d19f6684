//! Operator configuration from the environment.

use tracing::warn;

/// Default port of the health and metrics server.
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Runtime settings of the operator process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperatorConfig {
    /// Identity of this pod, used as leader election holder and event instance.
    pub pod_name: String,
    /// Namespace holding the leader election lease.
    pub pod_namespace: String,
    /// Restrict the controller to one namespace. `None` watches cluster-wide.
    pub watch_namespace: Option<String>,
    /// Port of the health and metrics server.
    pub health_port: u16,
}

impl OperatorConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let pod_name = non_empty("POD_NAME").unwrap_or_else(|| {
            warn!("POD_NAME not set, using hostname");
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        });

        let pod_namespace = non_empty("POD_NAMESPACE").unwrap_or_else(|| {
            warn!("POD_NAMESPACE not set, using 'default'");
            "default".to_string()
        });

        let health_port = match non_empty("HEALTH_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
                warn!(value = %raw, error = %e, "Invalid HEALTH_PORT, using default");
                DEFAULT_HEALTH_PORT
            }),
            None => DEFAULT_HEALTH_PORT,
        };

        Self {
            pod_name,
            pod_namespace,
            watch_namespace: non_empty("WATCH_NAMESPACE"),
            health_port,
        }
    }
}
