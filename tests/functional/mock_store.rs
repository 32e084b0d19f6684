//! In-memory stand-ins for the API server and the event recorder.
//!
//! `MockStore` keeps objects in maps and mimics the API server's optimistic
//! concurrency: create assigns `resourceVersion` 1, update is rejected with a
//! 409 unless the caller carries the current version. Failures can be injected
//! per kind and operation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use keydb_operator::controller::error::{Error, Result};
use keydb_operator::controller::events::{ApplyAction, EventSink};
use keydb_operator::controller::store::{ChildKind, ChildResource, ResourceStore};
use keydb_operator::crd::{KeyDb, KeyDbStatus};

type Key = (ChildKind, String, String);

/// Build a Kubernetes API error with the given status code.
pub fn api_error(code: u16) -> Error {
    Error::Kube(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected failure {code}"),
        reason: "Injected".to_string(),
        code,
    }))
}

/// Operation on which a failure can be injected.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Op {
    Get,
    Create,
    Update,
}

#[derive(Default)]
pub struct MockStore {
    keydbs: Mutex<HashMap<(String, String), KeyDb>>,
    objects: Mutex<BTreeMap<Key, ChildResource>>,
    statuses: Mutex<Vec<(String, String, KeyDbStatus)>>,
    failures: Mutex<HashMap<(ChildKind, Op), u16>>,
    fail_status: Mutex<HashSet<(String, String)>>,
    writes: Mutex<Vec<(Op, ChildKind, String)>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a KeyDb.
    pub fn insert_keydb(&self, keydb: KeyDb) {
        let key = (
            keydb.metadata.namespace.clone().unwrap_or_default(),
            keydb.metadata.name.clone().unwrap_or_default(),
        );
        self.keydbs.lock().unwrap().insert(key, keydb);
    }

    /// Seed a child object as if it had been created earlier.
    pub fn seed(&self, resource: impl Into<ChildResource>) {
        let mut resource = resource.into();
        resource.metadata_mut().resource_version = Some("1".to_string());
        let key = key_of(&resource);
        self.objects.lock().unwrap().insert(key, resource);
    }

    /// Make the given operation on `kind` fail with `code`.
    pub fn fail(&self, kind: ChildKind, op: Op, code: u16) {
        self.failures.lock().unwrap().insert((kind, op), code);
    }

    /// Make status writes for `namespace/name` fail.
    pub fn fail_status(&self, namespace: &str, name: &str) {
        self.fail_status
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()));
    }

    pub fn object(&self, kind: ChildKind, namespace: &str, name: &str) -> Option<ChildResource> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn objects_of(&self, kind: ChildKind) -> Vec<ChildResource> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Every status written, oldest first.
    pub fn statuses(&self) -> Vec<(String, String, KeyDbStatus)> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn last_status(&self) -> Option<KeyDbStatus> {
        self.statuses.lock().unwrap().last().map(|(_, _, s)| s.clone())
    }

    /// Successful create and update calls, in call order.
    pub fn writes(&self) -> Vec<(Op, ChildKind, String)> {
        self.writes.lock().unwrap().clone()
    }

    fn injected(&self, kind: ChildKind, op: Op) -> Result<()> {
        match self.failures.lock().unwrap().get(&(kind, op)) {
            Some(code) => Err(api_error(*code)),
            None => Ok(()),
        }
    }
}

fn key_of(resource: &ChildResource) -> Key {
    (
        resource.kind(),
        resource.namespace().to_string(),
        resource.name().to_string(),
    )
}

#[async_trait]
impl ResourceStore for MockStore {
    async fn get_keydb(&self, namespace: &str, name: &str) -> Result<Option<KeyDb>> {
        Ok(self
            .keydbs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get(
        &self,
        kind: ChildKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>> {
        self.injected(kind, Op::Get)?;
        Ok(self.object(kind, namespace, name))
    }

    async fn create(&self, resource: &ChildResource) -> Result<()> {
        self.injected(resource.kind(), Op::Create)?;
        let key = key_of(resource);
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(api_error(409));
        }
        let mut stored = resource.clone();
        stored.metadata_mut().resource_version = Some("1".to_string());
        objects.insert(key, stored);
        self.writes
            .lock()
            .unwrap()
            .push((Op::Create, resource.kind(), resource.name().to_string()));
        Ok(())
    }

    async fn update(&self, resource: &ChildResource) -> Result<()> {
        self.injected(resource.kind(), Op::Update)?;
        let key = key_of(resource);
        let mut objects = self.objects.lock().unwrap();
        let Some(current) = objects.get(&key) else {
            return Err(api_error(404));
        };
        let current_version = current.metadata().resource_version.clone();
        if resource.metadata().resource_version != current_version {
            return Err(api_error(409));
        }
        let next = current_version
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let mut stored = resource.clone();
        stored.metadata_mut().resource_version = Some(next.to_string());
        objects.insert(key, stored);
        self.writes
            .lock()
            .unwrap()
            .push((Op::Update, resource.kind(), resource.name().to_string()));
        Ok(())
    }

    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KeyDbStatus,
    ) -> Result<()> {
        if self
            .fail_status
            .lock()
            .unwrap()
            .contains(&(namespace.to_string(), name.to_string()))
        {
            return Err(api_error(500));
        }
        if !self
            .keydbs
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), name.to_string()))
        {
            return Err(api_error(404));
        }
        self.statuses
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string(), status.clone()));
        Ok(())
    }
}

/// Event sink that remembers everything it is told.
#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<(ApplyAction, ChildKind, String, String)>>,
    warnings: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<(ApplyAction, ChildKind, String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<ApplyAction> {
        self.notifications().into_iter().map(|(a, _, _, _)| a).collect()
    }

    pub fn warnings(&self) -> Vec<(String, String)> {
        self.warnings.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn notify(&self, action: ApplyAction, kind: ChildKind, name: &str, namespace: &str) {
        self.notifications.lock().unwrap().push((
            action,
            kind,
            name.to_string(),
            namespace.to_string(),
        ));
    }

    async fn warning(&self, reason: &str, message: &str) {
        self.warnings
            .lock()
            .unwrap()
            .push((reason.to_string(), message.to_string()));
    }
}

/// RNG whose entropy source always fails.
pub struct FailingRng;

impl rand::RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        Err(rand::Error::new(std::io::Error::other("entropy exhausted")))
    }
}
