//! Observability sink for reconciliation actions.
//!
//! The reconciler reports what it did through [`EventSink`] instead of
//! writing to the console. [`KubeEventSink`] logs the action and publishes it
//! as a Kubernetes Event on the owning KeyDb.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder};
use tracing::{info, warn};

use crate::controller::store::ChildKind;

/// What the applier did with a child resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ApplyAction {
    Created,
    Updated,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyAction::Created => write!(f, "Created"),
            ApplyAction::Updated => write!(f, "Updated"),
        }
    }
}

/// Receiver of reconciliation events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// A child resource was written.
    async fn notify(&self, action: ApplyAction, kind: ChildKind, name: &str, namespace: &str);

    /// Something degraded but reconciliation continues.
    async fn warning(&self, reason: &str, message: &str);
}

/// [`EventSink`] publishing Kubernetes Events against one KeyDb.
pub struct KubeEventSink {
    recorder: Recorder,
    owner: ObjectReference,
}

impl KubeEventSink {
    pub fn new(recorder: Recorder, owner: ObjectReference) -> Self {
        Self { recorder, owner }
    }

    async fn publish(&self, type_: EventType, reason: &str, action: &str, note: String) {
        if let Err(e) = self
            .recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note: Some(note),
                    action: action.into(),
                    secondary: None,
                },
                &self.owner,
            )
            .await
        {
            warn!(reason = %reason, error = %e, "Failed to publish event");
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn notify(&self, action: ApplyAction, kind: ChildKind, name: &str, namespace: &str) {
        info!(action = %action, kind = %kind, name = %name, namespace = %namespace, "Applied child resource");
        self.publish(
            EventType::Normal,
            &action.to_string(),
            "Reconciling",
            format!("{action} {kind} {namespace}/{name}"),
        )
        .await;
    }

    async fn warning(&self, reason: &str, message: &str) {
        warn!(reason = %reason, "{}", message);
        self.publish(EventType::Warning, reason, "Reconciling", message.to_string())
            .await;
    }
}
