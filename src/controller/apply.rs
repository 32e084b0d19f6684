//! Create-or-update of child resources.

use tracing::debug;

use crate::controller::error::Result;
use crate::controller::events::{ApplyAction, EventSink};
use crate::controller::store::{ChildResource, ResourceStore};

/// Ensure `desired` exists in the store with exactly the given content.
///
/// A missing object is created. An existing one is overwritten wholesale,
/// carrying over its `resourceVersion` so the replace is accepted. The action
/// taken is reported to `events`.
pub async fn apply_resource(
    store: &dyn ResourceStore,
    events: &dyn EventSink,
    mut desired: ChildResource,
) -> Result<ApplyAction> {
    let kind = desired.kind();
    let name = desired.name().to_string();
    let namespace = desired.namespace().to_string();

    let action = match store.get(kind, &namespace, &name).await? {
        None => {
            store.create(&desired).await?;
            ApplyAction::Created
        }
        Some(existing) => {
            desired.metadata_mut().resource_version = existing.metadata().resource_version.clone();
            store.update(&desired).await?;
            ApplyAction::Updated
        }
    };

    debug!(kind = %kind, name = %name, namespace = %namespace, action = %action, "Applied");
    events.notify(action, kind, &name, &namespace).await;
    Ok(action)
}
