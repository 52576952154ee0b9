use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// The seven provisioned entity kinds, declared in chain order.
///
/// The string form (`Display`/`FromStr`) is the REST collection path,
/// which is also the manifest key and the prefix of `$ref` targets:
/// `eventSources`, `actionTargets`, ...
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum EntityKind {
    EventSourceTemplates,
    EventTypes,
    EventSources,
    ActionTargetTemplates,
    ActionTypes,
    ActionTargets,
    Rules,
}

impl EntityKind {
    /// Every kind, in the order the chain provisions them.
    pub const ALL: [EntityKind; 7] = [
        Self::EventSourceTemplates,
        Self::EventTypes,
        Self::EventSources,
        Self::ActionTargetTemplates,
        Self::ActionTypes,
        Self::ActionTargets,
        Self::Rules,
    ];

    /// REST path segment, e.g. `eventSourceTemplates`.
    pub fn path(self) -> &'static str {
        self.into()
    }

    /// Human-readable singular name used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::EventSourceTemplates => "event source template",
            Self::EventTypes => "event type",
            Self::EventSources => "event source",
            Self::ActionTargetTemplates => "action target template",
            Self::ActionTypes => "action type",
            Self::ActionTargets => "action target",
            Self::Rules => "rule",
        }
    }

    /// Collection name as shown in the run summary (`EventSourceTemplates`).
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::EventSourceTemplates => "EventSourceTemplates",
            Self::EventTypes => "EventTypes",
            Self::EventSources => "EventSources",
            Self::ActionTargetTemplates => "ActionTargetTemplates",
            Self::ActionTypes => "ActionTypes",
            Self::ActionTargets => "ActionTargets",
            Self::Rules => "Rules",
        }
    }

    /// The kind an item's `template` key points into, if this kind has one.
    pub fn template_kind(self) -> Option<EntityKind> {
        match self {
            Self::EventSources => Some(Self::EventSourceTemplates),
            Self::ActionTargets => Some(Self::ActionTargetTemplates),
            _ => None,
        }
    }

    /// Payload field and lookup query parameter carrying the template id.
    pub fn template_field(self) -> Option<&'static str> {
        match self {
            Self::EventSources => Some("eventSourceTemplateId"),
            Self::ActionTargets => Some("actionTargetTemplateId"),
            _ => None,
        }
    }
}
