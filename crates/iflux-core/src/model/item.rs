use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::context::ProvisioningContext;
use crate::error::CoreError;
use crate::model::EntityId;
use crate::payload::Payload;

/// One unit of provisioning data plus its resolved remote id.
///
/// The payload starts as a template; [`resolve`](Self::resolve) produces
/// the concrete `data` sent to the API once the provisioning context is
/// known. Until then, `data()` falls back to the template.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    payload: Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<EntityId>,
    /// Key of the dependency item in the kind's template collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    search_only: bool,
}

impl Item {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            data: None,
            id: None,
            template: None,
            search_only: false,
        }
    }

    /// Reference the item with this key in the kind's template collection.
    pub fn with_template(mut self, key: impl Into<String>) -> Self {
        self.template = Some(key.into());
        self
    }

    /// Only look this item up; never create or update it.
    pub fn search_only(mut self) -> Self {
        self.search_only = true;
        self
    }

    /// The payload sent to the API: resolved data, or the raw template.
    pub fn data(&self) -> &Value {
        self.data.as_ref().unwrap_or_else(|| self.payload.template())
    }

    pub(crate) fn data_mut(&mut self) -> Option<&mut Value> {
        self.data.as_mut()
    }

    /// The `name` field used for lookups.
    pub fn name(&self) -> Option<&str> {
        self.data().get("name").and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn is_search_only(&self) -> bool {
        self.search_only
    }

    /// Record the remote id. An id is set at most once: a second,
    /// different id is ignored with a warning. Retries clear it first
    /// with [`forget_id`](Self::forget_id).
    pub(crate) fn assign_id(&mut self, id: EntityId) {
        match self.id {
            None => self.id = Some(id),
            Some(existing) if existing != id => {
                warn!(%existing, ignored = %id, "item already has an id");
            }
            Some(_) => {}
        }
    }

    /// Drop the id after a retried lookup no longer finds the entity it
    /// named. This is the only way an assigned id is re-assigned.
    pub(crate) fn forget_id(&mut self) -> Option<EntityId> {
        self.id.take()
    }

    /// Resolve the payload template against the context and stamp the
    /// organization id onto the result.
    pub(crate) fn resolve(&mut self, ctx: &ProvisioningContext) -> Result<(), CoreError> {
        let mut data = self.payload.resolve(ctx)?;
        if let Value::Object(map) = &mut data {
            map.insert("organizationId".into(), ctx.organization_id.into());
        }
        self.data = Some(data);
        Ok(())
    }
}

impl From<Value> for Item {
    fn from(template: Value) -> Self {
        Self::new(template)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::context::Params;

    #[test]
    fn resolve_stamps_organization_id() {
        let mut item = Item::new(json!({ "name": "Citizen", "public": true }));
        let ctx = ProvisioningContext::new(EntityId::new(5), "http://localhost/v1".parse().unwrap(), Params::default());

        item.resolve(&ctx).unwrap();

        assert_eq!(
            item.data(),
            &json!({ "name": "Citizen", "public": true, "organizationId": 5 })
        );
    }

    #[test]
    fn id_is_assigned_once() {
        let mut item = Item::new(json!({ "name": "x" }));
        item.assign_id(EntityId::new(1));
        item.assign_id(EntityId::new(2));
        assert_eq!(item.id(), Some(EntityId::new(1)));
    }

    #[test]
    fn forgotten_id_can_be_reassigned() {
        let mut item = Item::new(json!({ "name": "x" }));
        item.assign_id(EntityId::new(8));
        assert_eq!(item.forget_id(), Some(EntityId::new(8)));
        item.assign_id(EntityId::new(99));
        assert_eq!(item.id(), Some(EntityId::new(99)));
    }
}
