//! Access to persisted objects.
//!
//! The reconciler only talks to the API server through [`ResourceStore`], so
//! it can be driven by an in-memory store in tests. [`KubeStore`] is the
//! production implementation over `kube::Api`.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client};

use crate::controller::context::FIELD_MANAGER;
use crate::controller::error::Result;
use crate::crd::{KeyDb, KeyDbStatus};

/// Kind of a child resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ChildKind {
    Service,
    ConfigMap,
    Secret,
    ServiceAccount,
    StatefulSet,
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKind::Service => write!(f, "Service"),
            ChildKind::ConfigMap => write!(f, "ConfigMap"),
            ChildKind::Secret => write!(f, "Secret"),
            ChildKind::ServiceAccount => write!(f, "ServiceAccount"),
            ChildKind::StatefulSet => write!(f, "StatefulSet"),
        }
    }
}

/// A fully specified child object of a KeyDb.
#[derive(Clone, Debug, PartialEq)]
pub enum ChildResource {
    Service(Service),
    ConfigMap(ConfigMap),
    Secret(Secret),
    ServiceAccount(ServiceAccount),
    StatefulSet(StatefulSet),
}

impl ChildResource {
    /// Kind tag of the wrapped object.
    pub fn kind(&self) -> ChildKind {
        match self {
            ChildResource::Service(_) => ChildKind::Service,
            ChildResource::ConfigMap(_) => ChildKind::ConfigMap,
            ChildResource::Secret(_) => ChildKind::Secret,
            ChildResource::ServiceAccount(_) => ChildKind::ServiceAccount,
            ChildResource::StatefulSet(_) => ChildKind::StatefulSet,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ChildResource::Service(o) => &o.metadata,
            ChildResource::ConfigMap(o) => &o.metadata,
            ChildResource::Secret(o) => &o.metadata,
            ChildResource::ServiceAccount(o) => &o.metadata,
            ChildResource::StatefulSet(o) => &o.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ChildResource::Service(o) => &mut o.metadata,
            ChildResource::ConfigMap(o) => &mut o.metadata,
            ChildResource::Secret(o) => &mut o.metadata,
            ChildResource::ServiceAccount(o) => &mut o.metadata,
            ChildResource::StatefulSet(o) => &mut o.metadata,
        }
    }

    /// Object name. Generators always set it.
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// Object namespace. Generators always set it.
    pub fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }
}

impl From<Service> for ChildResource {
    fn from(o: Service) -> Self {
        ChildResource::Service(o)
    }
}

impl From<ConfigMap> for ChildResource {
    fn from(o: ConfigMap) -> Self {
        ChildResource::ConfigMap(o)
    }
}

impl From<Secret> for ChildResource {
    fn from(o: Secret) -> Self {
        ChildResource::Secret(o)
    }
}

impl From<ServiceAccount> for ChildResource {
    fn from(o: ServiceAccount) -> Self {
        ChildResource::ServiceAccount(o)
    }
}

impl From<StatefulSet> for ChildResource {
    fn from(o: StatefulSet) -> Self {
        ChildResource::StatefulSet(o)
    }
}

/// Persistence operations the reconciler depends on.
///
/// `get*` return `Ok(None)` for objects that do not exist; any other failure
/// is an error.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch the KeyDb itself.
    async fn get_keydb(&self, namespace: &str, name: &str) -> Result<Option<KeyDb>>;

    /// Fetch a child object.
    async fn get(&self, kind: ChildKind, namespace: &str, name: &str)
    -> Result<Option<ChildResource>>;

    /// Create a child object.
    async fn create(&self, resource: &ChildResource) -> Result<()>;

    /// Replace a child object.
    async fn update(&self, resource: &ChildResource) -> Result<()>;

    /// Write the status subresource of a KeyDb.
    async fn update_status(&self, namespace: &str, name: &str, status: &KeyDbStatus)
    -> Result<()>;
}

/// [`ResourceStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_keydb(&self, namespace: &str, name: &str) -> Result<Option<KeyDb>> {
        Ok(self.api::<KeyDb>(namespace).get_opt(name).await?)
    }

    async fn get(
        &self,
        kind: ChildKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>> {
        let found = match kind {
            ChildKind::Service => self
                .api::<Service>(namespace)
                .get_opt(name)
                .await?
                .map(ChildResource::from),
            ChildKind::ConfigMap => self
                .api::<ConfigMap>(namespace)
                .get_opt(name)
                .await?
                .map(ChildResource::from),
            ChildKind::Secret => self
                .api::<Secret>(namespace)
                .get_opt(name)
                .await?
                .map(ChildResource::from),
            ChildKind::ServiceAccount => self
                .api::<ServiceAccount>(namespace)
                .get_opt(name)
                .await?
                .map(ChildResource::from),
            ChildKind::StatefulSet => self
                .api::<StatefulSet>(namespace)
                .get_opt(name)
                .await?
                .map(ChildResource::from),
        };
        Ok(found)
    }

    async fn create(&self, resource: &ChildResource) -> Result<()> {
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        let ns = resource.namespace();
        match resource {
            ChildResource::Service(o) => {
                self.api::<Service>(ns).create(&pp, o).await?;
            }
            ChildResource::ConfigMap(o) => {
                self.api::<ConfigMap>(ns).create(&pp, o).await?;
            }
            ChildResource::Secret(o) => {
                self.api::<Secret>(ns).create(&pp, o).await?;
            }
            ChildResource::ServiceAccount(o) => {
                self.api::<ServiceAccount>(ns).create(&pp, o).await?;
            }
            ChildResource::StatefulSet(o) => {
                self.api::<StatefulSet>(ns).create(&pp, o).await?;
            }
        }
        Ok(())
    }

    async fn update(&self, resource: &ChildResource) -> Result<()> {
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        let ns = resource.namespace();
        let name = resource.name();
        match resource {
            ChildResource::Service(o) => {
                self.api::<Service>(ns).replace(name, &pp, o).await?;
            }
            ChildResource::ConfigMap(o) => {
                self.api::<ConfigMap>(ns).replace(name, &pp, o).await?;
            }
            ChildResource::Secret(o) => {
                self.api::<Secret>(ns).replace(name, &pp, o).await?;
            }
            ChildResource::ServiceAccount(o) => {
                self.api::<ServiceAccount>(ns).replace(name, &pp, o).await?;
            }
            ChildResource::StatefulSet(o) => {
                self.api::<StatefulSet>(ns).replace(name, &pp, o).await?;
            }
        }
        Ok(())
    }

    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KeyDbStatus,
    ) -> Result<()> {
        let mut body = serde_json::to_value(status)?;
        // A merge patch only clears a field given as null
        if let Some(fields) = body.as_object_mut() {
            fields.entry("message").or_insert(serde_json::Value::Null);
        }
        let patch = serde_json::json!({
            "status": body
        });
        self.api::<KeyDb>(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
