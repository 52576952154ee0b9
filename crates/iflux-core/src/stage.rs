// ── Stage descriptors ──
//
// The chain is data, not wiring: one descriptor per entity kind, walked
// in order by the runner with a single generic manager.

use serde_json::Value;

use crate::context::ProvisioningContext;
use crate::model::{EntityId, EntityKind};

/// How a stage extends an item's payload before sending it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extend {
    /// Send the prepared data as is.
    None,
    /// Merge in `organizationId`.
    Organization,
    /// Merge in `organizationId` and the template's id under the kind's
    /// template field (`eventSourceTemplateId`, `actionTargetTemplateId`).
    OrganizationAndTemplate,
}

/// One link of the provisioning chain.
#[derive(Debug, Clone)]
pub struct Stage {
    pub kind: EntityKind,
    /// Look items up only; never create or update.
    pub search_only: bool,
    pub extend: Extend,
}

impl Stage {
    pub fn new(kind: EntityKind) -> Self {
        let extend = match kind {
            EntityKind::EventTypes | EntityKind::ActionTypes => Extend::None,
            EntityKind::EventSources | EntityKind::ActionTargets => Extend::OrganizationAndTemplate,
            EntityKind::EventSourceTemplates
            | EntityKind::ActionTargetTemplates
            | EntityKind::Rules => Extend::Organization,
        };
        Self {
            kind,
            search_only: false,
            extend,
        }
    }

    /// `/<path>` for lookups and creation.
    pub fn collection_path(&self) -> String {
        format!("/{}", self.kind.path())
    }

    /// `/<path>/<id>` for updates.
    pub fn item_path(&self, id: EntityId) -> String {
        format!("/{}/{id}", self.kind.path())
    }

    /// Query for a lookup: `name`, plus the template id for kinds that
    /// are scoped to a template.
    pub fn lookup_query(&self, name: &str, template_id: Option<EntityId>) -> Vec<(&'static str, String)> {
        let mut query = vec![("name", name.to_owned())];
        if let (Some(field), Some(id)) = (self.kind.template_field(), template_id) {
            query.push((field, id.to_string()));
        }
        query
    }

    /// The request body for create/update.
    pub fn payload(
        &self,
        data: &Value,
        template_id: Option<EntityId>,
        ctx: &ProvisioningContext,
    ) -> Value {
        let mut payload = data.clone();
        let Value::Object(map) = &mut payload else {
            return payload;
        };
        if matches!(self.extend, Extend::Organization | Extend::OrganizationAndTemplate) {
            map.insert("organizationId".into(), ctx.organization_id.into());
        }
        if self.extend == Extend::OrganizationAndTemplate {
            if let (Some(field), Some(id)) = (self.kind.template_field(), template_id) {
                map.insert(field.into(), id.into());
            }
        }
        payload
    }
}

/// The fixed chain, in dependency order. Kinds listed in `search_only`
/// are looked up but never written.
pub fn chain(search_only: &[EntityKind]) -> Vec<Stage> {
    EntityKind::ALL
        .into_iter()
        .map(|kind| Stage {
            search_only: search_only.contains(&kind),
            ..Stage::new(kind)
        })
        .collect()
}
