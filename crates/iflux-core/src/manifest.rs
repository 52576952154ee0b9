// ── Provisioning manifests ──
//
// A manifest declares every collection of a run, plus params, in one
// YAML or JSON document. Key order in the document is processing order.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Params;
use crate::error::CoreError;
use crate::model::{Collection, EntityKind, Item};
use crate::rules::{collect_refs, parse_ref};

/// One item as declared in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ItemSpec {
    /// Payload template; strings may carry `{{param}}` placeholders.
    pub data: Value,
    /// Key of the dependency item (event sources and action targets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub search_only: bool,
}

impl From<ItemSpec> for Item {
    fn from(spec: ItemSpec) -> Self {
        let mut item = Item::new(spec.data);
        if let Some(template) = spec.template {
            item = item.with_template(template);
        }
        if spec.search_only {
            item = item.search_only();
        }
        item
    }
}

type Declared = IndexMap<String, ItemSpec>;

/// All collections of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub event_source_templates: Declared,
    #[serde(default)]
    pub event_types: Declared,
    #[serde(default)]
    pub event_sources: Declared,
    #[serde(default)]
    pub action_target_templates: Declared,
    #[serde(default)]
    pub action_types: Declared,
    #[serde(default)]
    pub action_targets: Declared,
    #[serde(default)]
    pub rules: Declared,
    #[serde(default)]
    pub params: Params,
}

/// Document syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
}

impl ManifestFormat {
    /// `.json` files are JSON; anything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// A problem found by [`Manifest::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestIssue {
    pub kind: EntityKind,
    pub key: String,
    pub message: String,
}

impl fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.kind, self.key, self.message)
    }
}

impl Manifest {
    pub fn parse(text: &str, format: ManifestFormat) -> Result<Self, CoreError> {
        match format {
            ManifestFormat::Yaml => serde_yaml::from_str(text).map_err(|e| CoreError::Manifest {
                message: e.to_string(),
            }),
            ManifestFormat::Json => serde_json::from_str(text).map_err(|e| CoreError::Manifest {
                message: e.to_string(),
            }),
        }
    }

    pub fn declared(&self, kind: EntityKind) -> &IndexMap<String, ItemSpec> {
        match kind {
            EntityKind::EventSourceTemplates => &self.event_source_templates,
            EntityKind::EventTypes => &self.event_types,
            EntityKind::EventSources => &self.event_sources,
            EntityKind::ActionTargetTemplates => &self.action_target_templates,
            EntityKind::ActionTypes => &self.action_types,
            EntityKind::ActionTargets => &self.action_targets,
            EntityKind::Rules => &self.rules,
        }
    }

    pub fn item_count(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.declared(*k).len()).sum()
    }

    /// Split into the declared collections (chain order, empty ones
    /// skipped) and the params.
    pub fn into_parts(self) -> (Vec<(EntityKind, Collection)>, Params) {
        let Self {
            event_source_templates,
            event_types,
            event_sources,
            action_target_templates,
            action_types,
            action_targets,
            rules,
            params,
        } = self;

        let collections = [
            (EntityKind::EventSourceTemplates, event_source_templates),
            (EntityKind::EventTypes, event_types),
            (EntityKind::EventSources, event_sources),
            (EntityKind::ActionTargetTemplates, action_target_templates),
            (EntityKind::ActionTypes, action_types),
            (EntityKind::ActionTargets, action_targets),
            (EntityKind::Rules, rules),
        ]
        .into_iter()
        .filter(|(_, declared)| !declared.is_empty())
        .map(|(kind, declared)| (kind, declared.into_iter().collect()))
        .collect();

        (collections, params)
    }

    /// Check cross-references without touching the network.
    pub fn validate(&self) -> Vec<ManifestIssue> {
        let mut issues = Vec::new();

        for kind in EntityKind::ALL {
            for (key, spec) in self.declared(kind) {
                let mut issue = |message: String| {
                    issues.push(ManifestIssue {
                        kind,
                        key: key.clone(),
                        message,
                    });
                };

                if !spec.search_only && spec.data.get("name").and_then(Value::as_str).is_none() {
                    issue("data.name must be a string".into());
                }

                match (kind.template_kind(), &spec.template) {
                    (Some(template_kind), Some(template)) => {
                        if !self.declared(template_kind).contains_key(template) {
                            issue(format!("template '{template}' is not declared in {template_kind}"));
                        }
                    }
                    (Some(template_kind), None) => {
                        issue(format!("missing template (a key of {template_kind})"));
                    }
                    (None, Some(_)) => issue(format!("{kind} items take no template")),
                    (None, None) => {}
                }

                for reference in collect_refs(&spec.data) {
                    match parse_ref(reference) {
                        Some((ref_kind, ref_key)) if self.declared(ref_kind).contains_key(ref_key) => {}
                        Some(_) => issue(format!("reference '{reference}' is not declared")),
                        None => issue(format!("reference '{reference}' is not <kind>/<key>")),
                    }
                }
            }
        }

        issues
    }
}
