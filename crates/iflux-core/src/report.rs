// ── Run reports ──
//
// What a run did, item by item, in processing order. Serializable so the
// CLI can print it as a table or dump it as JSON/YAML.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, IntoStaticStr};

use crate::manager::ItemOutcome;
use crate::model::{EntityId, EntityKind};

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RunStatus {
    /// Every stage ran and no item failed.
    Completed,
    /// Every stage ran; some items failed and were skipped.
    CompletedWithFailures,
    /// The halt policy stopped the run at a failed item.
    Halted,
}

/// Where and why a run was halted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Halt {
    pub kind: EntityKind,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub kind: EntityKind,
    pub search_only: bool,
    pub items: Vec<ItemReport>,
}

impl StageReport {
    pub fn new(kind: EntityKind, search_only: bool) -> Self {
        Self {
            kind,
            search_only,
            items: Vec::new(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.outcome.is_failure())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub organization: String,
    pub organization_id: EntityId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<Halt>,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn stage(&self, kind: EntityKind) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    pub fn items(&self) -> impl Iterator<Item = (EntityKind, &ItemReport)> {
        self.stages
            .iter()
            .flat_map(|s| s.items.iter().map(move |i| (s.kind, i)))
    }

    pub fn failure_count(&self) -> usize {
        self.stages.iter().map(|s| s.failures().count()).sum()
    }

    /// Status implied by the stages, absent a halt.
    pub(crate) fn settle(stages: &[StageReport]) -> RunStatus {
        if stages.iter().any(|s| s.failures().next().is_some()) {
            RunStatus::CompletedWithFailures
        } else {
            RunStatus::Completed
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
