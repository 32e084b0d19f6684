//! Reconciliation loop for KeyDb.
//!
//! [`Reconciler`] holds the whole convergence logic and depends only on the
//! [`ResourceStore`] and [`EventSink`] seams. [`reconcile`] and
//! [`error_policy`] adapt it to `kube::runtime::Controller`.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use rand::RngCore;
use rand::rngs::OsRng;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::controller::apply::apply_resource;
use crate::controller::context::Context;
use crate::controller::credentials::{CredentialSource, resolve_credential};
use crate::controller::error::{Error, Result};
use crate::controller::events::{EventSink, KubeEventSink};
use crate::controller::store::{ChildResource, KubeStore, ResourceStore};
use crate::crd::{KeyDb, KeyDbStatus};
use crate::resources::configmap::generate_config_maps;
use crate::resources::secret::generate_secret;
use crate::resources::service_account::generate_service_account;
use crate::resources::services::generate_services;
use crate::resources::statefulset::generate_statefulset;

/// Result of a successful reconciliation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// All child resources were written and the status set to Running.
    Applied {
        /// Where the password in use came from.
        credential: CredentialSource,
    },
    /// The KeyDb no longer exists; nothing was done.
    Deleted,
}

/// Converges the child resources of one KeyDb onto its spec.
pub struct Reconciler<'a> {
    store: &'a dyn ResourceStore,
    events: &'a dyn EventSink,
    /// Entropy for generated passwords.
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl<'a> Reconciler<'a> {
    /// Reconciler drawing generated passwords from the OS RNG.
    pub fn new(store: &'a dyn ResourceStore, events: &'a dyn EventSink) -> Self {
        Self::with_rng(store, events, OsRng)
    }

    /// Reconciler drawing generated passwords from `rng`.
    pub fn with_rng(
        store: &'a dyn ResourceStore,
        events: &'a dyn EventSink,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        Self {
            store,
            events,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Reconcile the KeyDb `namespace/name`.
    ///
    /// Every child is generated before the first write, so an invalid spec
    /// leaves the cluster untouched. Writes happen in dependency order:
    /// services, config maps, secret, service account, statefulset. The first
    /// failure aborts the remaining steps and the status is left as it was.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Outcome> {
        let Some(keydb) = self.store.get_keydb(namespace, name).await? else {
            debug!(name = %name, namespace = %namespace, "KeyDb not found, nothing to do");
            return Ok(Outcome::Deleted);
        };

        let credential = {
            let mut rng = self.rng.lock().await;
            resolve_credential(self.store, &keydb, &mut *rng).await?
        };
        debug!(name = %name, source = %credential.source, "Resolved credential");
        if credential.source == CredentialSource::Fallback {
            self.events
                .warning(
                    "CredentialFallback",
                    "Password generation failed, a placeholder password is in use",
                )
                .await;
        }

        let children = desired_children(&keydb, &credential.password)?;
        for child in children {
            apply_resource(self.store, self.events, child).await?;
        }

        self.store
            .update_status(namespace, name, &KeyDbStatus::running(keydb.metadata.generation))
            .await?;

        info!(name = %name, namespace = %namespace, "KeyDb reconciled");
        Ok(Outcome::Applied {
            credential: credential.source,
        })
    }

    /// Record a failed reconciliation in the KeyDb status.
    ///
    /// Best effort: a failure to write the status is logged and dropped.
    pub async fn record_failure(&self, namespace: &str, name: &str, generation: Option<i64>, cause: &Error) {
        let status = KeyDbStatus::failed(cause.to_string(), generation);
        if let Err(e) = self.store.update_status(namespace, name, &status).await {
            if !e.is_not_found() {
                warn!(name = %name, namespace = %namespace, error = %e, "Failed to record failed status");
            }
        }
    }
}

/// Every child object of `keydb`, in apply order.
pub fn desired_children(keydb: &KeyDb, password: &str) -> Result<Vec<ChildResource>> {
    let mut children: Vec<ChildResource> = Vec::with_capacity(7);
    children.extend(generate_services(keydb)?.into_iter().map(ChildResource::from));
    children.extend(
        generate_config_maps(keydb, password)?
            .into_iter()
            .map(ChildResource::from),
    );
    children.push(generate_secret(keydb, password)?.into());
    children.push(generate_service_account(keydb)?.into());
    children.push(generate_statefulset(keydb)?.into());
    Ok(children)
}

/// Reconcile a KeyDb
///
/// Entry point for the controller. Success waits for the next change; errors
/// are handed to [`error_policy`] for backoff.
pub async fn reconcile(obj: Arc<KeyDb>, ctx: Arc<Context>) -> Result<Action> {
    let start_time = Instant::now();
    let name = obj.name_any();
    let namespace = obj
        .namespace()
        .ok_or_else(|| Error::MissingField(format!("metadata.namespace of KeyDb {name}")))?;

    debug!(name = %name, namespace = %namespace, "Reconciling KeyDb");

    let store = KubeStore::new(ctx.client.clone());
    let events = KubeEventSink::new(ctx.recorder(), obj.object_ref(&()));
    let reconciler = Reconciler::new(&store, &events);

    match reconciler.reconcile(&namespace, &name).await {
        Ok(outcome) => {
            if let Some(ref health_state) = ctx.health_state {
                let duration = start_time.elapsed().as_secs_f64();
                health_state
                    .metrics
                    .record_reconcile(&namespace, &name, duration);
                if let Outcome::Applied {
                    credential: CredentialSource::Fallback,
                } = outcome
                {
                    health_state
                        .metrics
                        .record_credential_fallback(&namespace, &name);
                }
                health_state
                    .last_reconcile
                    .store(jiff::Timestamp::now().as_second().unsigned_abs(), Ordering::Relaxed);
            }
            Ok(Action::await_change())
        }
        Err(e) => {
            reconciler
                .record_failure(&namespace, &name, obj.metadata.generation, &e)
                .await;
            Err(e)
        }
    }
}

/// Error policy for the controller
pub fn error_policy(obj: Arc<KeyDb>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    // Record error metric
    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_error(&namespace, &name);
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
    } else {
        error!(name = %name, error = %error, "Non-retryable error");
    }
    Action::requeue(error.requeue_after())
}
