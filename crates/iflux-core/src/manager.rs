// ── Entity manager ──
//
// The find → create/update state machine applied to each item of a stage.
// Lookups go by name (plus template id where the kind is scoped to a
// template); a singleton match means "exists", anything else means
// "create it". A 500 carrying the remote action target message sends the
// item back to find, up to `max_retries` times.

use std::fmt;

use serde::Serialize;
use tracing::{error, info, warn};

use iflux_api::{ApiResponse, RestApi, StatusCode};

use crate::context::ProvisioningContext;
use crate::error::CoreError;
use crate::model::{EntityId, Item};
use crate::stage::Stage;

/// Body message of the transient failure that warrants a retry.
pub const REMOTE_ACTION_TARGET_ERROR: &str = "Unable to configure the remote action target.";

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ItemOutcome {
    /// Search-only item found.
    Found { id: EntityId },
    /// Search-only item not found; nothing was created.
    NotFound,
    Created { id: EntityId },
    Updated { id: EntityId },
    /// Update answered `304 Not Modified`.
    Unchanged { id: EntityId },
    /// Update answered an unexpected status. Processing continues.
    UpdateFailed { id: EntityId, status: u16 },
    /// Create answered an unexpected status (or an unusable `Location`).
    CreateFailed { status: u16, message: Option<String> },
    /// The remote configuration failure persisted past the retry bound.
    RetriesExhausted { attempts: u32 },
    /// The item's template has no id (missing, or failed earlier).
    UnresolvedTemplate { template: Option<String> },
}

impl ItemOutcome {
    /// The remote id the item ended up with, if any.
    pub fn id(&self) -> Option<EntityId> {
        match self {
            Self::Found { id }
            | Self::Created { id }
            | Self::Updated { id }
            | Self::Unchanged { id }
            | Self::UpdateFailed { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Outcomes the create-failure policy applies to.
    pub fn is_create_failure(&self) -> bool {
        matches!(
            self,
            Self::CreateFailed { .. } | Self::RetriesExhausted { .. } | Self::UnresolvedTemplate { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        self.is_create_failure() || matches!(self, Self::UpdateFailed { .. })
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found { id } => write!(f, "found ({id})"),
            Self::NotFound => f.write_str("not found"),
            Self::Created { id } => write!(f, "created ({id})"),
            Self::Updated { id } => write!(f, "updated ({id})"),
            Self::Unchanged { id } => write!(f, "unchanged ({id})"),
            Self::UpdateFailed { id, status } => write!(f, "update failed ({id}, HTTP {status})"),
            Self::CreateFailed {
                status,
                message: Some(message),
            } => write!(f, "create failed (HTTP {status}): {message}"),
            Self::CreateFailed {
                status,
                message: None,
            } => write!(f, "create failed (HTTP {status})"),
            Self::RetriesExhausted { attempts } => {
                write!(f, "remote configuration failed {attempts} times")
            }
            Self::UnresolvedTemplate {
                template: Some(template),
            } => write!(f, "template '{template}' has no id"),
            Self::UnresolvedTemplate { template: None } => f.write_str("no template given"),
        }
    }
}

/// Where a create/update leaves the item.
enum Step {
    Done(ItemOutcome),
    RetryFind,
}

/// Find/create/update controller for one stage.
pub struct EntityManager<'a, A> {
    api: &'a A,
    stage: &'a Stage,
    max_retries: u32,
}

impl<'a, A: RestApi> EntityManager<'a, A> {
    pub fn new(api: &'a A, stage: &'a Stage, max_retries: u32) -> Self {
        Self {
            api,
            stage,
            max_retries,
        }
    }

    fn label(&self) -> &'static str {
        self.stage.kind.label()
    }

    /// Drive one item to a final outcome.
    ///
    /// `template_id` is the id of the item's template for kinds scoped to
    /// one; it is required for those kinds.
    pub async fn process(
        &self,
        item: &mut Item,
        template_id: Option<EntityId>,
        ctx: &ProvisioningContext,
    ) -> Result<ItemOutcome, CoreError> {
        let search_only = self.stage.search_only || item.is_search_only();

        if self.stage.kind.template_kind().is_some() && template_id.is_none() {
            if search_only {
                warn!(
                    kind = self.label(),
                    name = item.name().unwrap_or_default(),
                    template = item.template().unwrap_or_default(),
                    "template has no id, nothing to look up"
                );
                return Ok(ItemOutcome::NotFound);
            }
            error!(
                kind = self.label(),
                name = item.name().unwrap_or_default(),
                template = item.template().unwrap_or_default(),
                "template has no id, skipping"
            );
            return Ok(ItemOutcome::UnresolvedTemplate {
                template: item.template().map(String::from),
            });
        }

        let mut retries = 0;

        loop {
            let retry = retries > 0;
            let found = self.find(item, template_id, retry).await?;
            if retry {
                // A retried lookup is authoritative over an earlier match.
                if let Some(stale) = item.forget_id().filter(|stale| Some(*stale) != found) {
                    warn!(
                        kind = self.label(),
                        name = item.name().unwrap_or_default(),
                        %stale,
                        "previous match is gone"
                    );
                }
            }

            let step = match (found, search_only) {
                (Some(id), true) => {
                    item.assign_id(id);
                    Step::Done(ItemOutcome::Found { id })
                }
                (None, true) => {
                    warn!(kind = self.label(), name = item.name().unwrap_or_default(), "not found");
                    Step::Done(ItemOutcome::NotFound)
                }
                (Some(id), false) => {
                    item.assign_id(id);
                    self.update(item, template_id, ctx).await?
                }
                (None, false) => self.create(item, template_id, ctx).await?,
            };

            match step {
                Step::Done(outcome) => return Ok(outcome),
                Step::RetryFind if retries >= self.max_retries => {
                    error!(
                        kind = self.label(),
                        name = item.name().unwrap_or_default(),
                        attempts = retries + 1,
                        "remote configuration kept failing, giving up"
                    );
                    return Ok(ItemOutcome::RetriesExhausted {
                        attempts: retries + 1,
                    });
                }
                Step::RetryFind => retries += 1,
            }
        }
    }

    /// Look the item up by name. Returns the id of a singleton match.
    pub async fn find(
        &self,
        item: &Item,
        template_id: Option<EntityId>,
        retry: bool,
    ) -> Result<Option<EntityId>, CoreError> {
        let name = item.name().unwrap_or_default();
        let query = self.stage.lookup_query(name, template_id);
        let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();

        info!(kind = self.label(), name, retry, "find");
        let resp = self.api.get(&self.stage.collection_path(), &query).await?;

        match resp.single_match_id().map(EntityId::new) {
            Some(id) => {
                info!(kind = self.label(), name, %id, "found");
                Ok(Some(id))
            }
            None => {
                if !item.is_search_only() && !self.stage.search_only {
                    warn!(kind = self.label(), name, "not found");
                }
                Ok(None)
            }
        }
    }

    async fn create(
        &self,
        item: &mut Item,
        template_id: Option<EntityId>,
        ctx: &ProvisioningContext,
    ) -> Result<Step, CoreError> {
        let name = item.name().unwrap_or_default().to_owned();
        let payload = self.stage.payload(item.data(), template_id, ctx);

        info!(kind = self.label(), name, "try to create");
        let resp = self.api.post(&self.stage.collection_path(), &payload).await?;

        if resp.status == StatusCode::CREATED {
            return Ok(Step::Done(match resp.location_id() {
                Ok(id) => {
                    let id = EntityId::new(id);
                    item.assign_id(id);
                    info!(kind = self.label(), name, %id, "created");
                    ItemOutcome::Created { id }
                }
                Err(e) => {
                    error!(kind = self.label(), name, error = %e, "created, but the id is unknown");
                    ItemOutcome::CreateFailed {
                        status: resp.status.as_u16(),
                        message: Some(e.to_string()),
                    }
                }
            }));
        }

        if is_remote_configuration_failure(&resp) {
            self.warn_remote_configuration(&name);
            return Ok(Step::RetryFind);
        }

        error!(
            kind = self.label(),
            name,
            status = resp.status.as_u16(),
            %payload,
            body = %resp.body,
            "an error has occurred in the creation"
        );
        Ok(Step::Done(ItemOutcome::CreateFailed {
            status: resp.status.as_u16(),
            message: resp.error_message().map(String::from),
        }))
    }

    async fn update(
        &self,
        item: &Item,
        template_id: Option<EntityId>,
        ctx: &ProvisioningContext,
    ) -> Result<Step, CoreError> {
        let name = item.name().unwrap_or_default();
        let Some(id) = item.id() else {
            return Ok(Step::RetryFind);
        };
        let payload = self.stage.payload(item.data(), template_id, ctx);

        info!(kind = self.label(), name, %id, "try to update");
        let resp = self.api.patch(&self.stage.item_path(id), &payload).await?;

        let outcome = match resp.status {
            StatusCode::CREATED => {
                info!(kind = self.label(), name, %id, "updated");
                ItemOutcome::Updated { id }
            }
            StatusCode::NOT_MODIFIED => {
                warn!(kind = self.label(), name, %id, "nothing updated");
                ItemOutcome::Unchanged { id }
            }
            _ if is_remote_configuration_failure(&resp) => {
                self.warn_remote_configuration(name);
                return Ok(Step::RetryFind);
            }
            status => {
                error!(
                    kind = self.label(),
                    name,
                    status = status.as_u16(),
                    body = %resp.body,
                    "there is an error"
                );
                ItemOutcome::UpdateFailed {
                    id,
                    status: status.as_u16(),
                }
            }
        };
        Ok(Step::Done(outcome))
    }

    fn warn_remote_configuration(&self, name: &str) {
        warn!(
            kind = self.label(),
            name,
            message = REMOTE_ACTION_TARGET_ERROR,
            "remote configuration failed, the iFLUX system may not behave as expected; retrying"
        );
    }
}

fn is_remote_configuration_failure(resp: &ApiResponse) -> bool {
    resp.status == StatusCode::INTERNAL_SERVER_ERROR
        && resp.error_message() == Some(REMOTE_ACTION_TARGET_ERROR)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::context::Params;
    use crate::model::EntityKind;
    use crate::testing::{Recorded, ScriptedApi, created, remote_config_failure};

    fn ctx() -> ProvisioningContext {
        ProvisioningContext::new(
            EntityId::new(5),
            "http://localhost:3000/v1".parse().unwrap(),
            Params::default(),
        )
    }

    fn rule() -> Item {
        let mut item = Item::new(json!({ "name": "notify", "active": true }));
        item.resolve(&ctx()).unwrap();
        item
    }

    async fn process(
        api: &ScriptedApi,
        stage: &Stage,
        item: &mut Item,
        template_id: Option<EntityId>,
    ) -> ItemOutcome {
        EntityManager::new(api, stage, 3)
            .process(item, template_id, &ctx())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn singleton_match_sets_id_and_never_creates() {
        let api = ScriptedApi::new([
            ApiResponse::with_status(200, json!([{ "id": 42 }])),
            ApiResponse::with_status(201, Value::Null),
        ]);
        let stage = Stage::new(EntityKind::Rules);
        let mut item = rule();

        let outcome = process(&api, &stage, &mut item, None).await;

        assert_eq!(outcome, ItemOutcome::Updated { id: EntityId::new(42) });
        assert_eq!(item.id(), Some(EntityId::new(42)));
        assert_eq!(api.count("POST"), 0);
        let requests = api.requests();
        assert_eq!(requests[1].method, "PATCH");
        assert_eq!(requests[1].path, "/rules/42");
    }

    #[tokio::test]
    async fn empty_lookup_creates_once_with_extended_payload() {
        let api = ScriptedApi::new([
            ApiResponse::with_status(200, json!([])),
            created("/v1/eventSources/11"),
        ]);
        let stage = Stage::new(EntityKind::EventSources);
        let mut item = Item::new(json!({ "name": "Lausanne" })).with_template("publibike");
        item.resolve(&ctx()).unwrap();

        let outcome = process(&api, &stage, &mut item, Some(EntityId::new(3))).await;

        assert_eq!(outcome, ItemOutcome::Created { id: EntityId::new(11) });
        let requests = api.requests();
        assert_eq!(
            requests[0],
            Recorded::get(
                "/eventSources",
                &[("name", "Lausanne"), ("eventSourceTemplateId", "3")]
            )
        );
        assert_eq!(api.count("POST"), 1);
        assert_eq!(
            requests[1].body,
            Some(json!({ "name": "Lausanne", "organizationId": 5, "eventSourceTemplateId": 3 }))
        );
    }

    #[tokio::test]
    async fn create_reads_id_from_location() {
        let api = ScriptedApi::new([ApiResponse::with_status(200, json!([])), created("/rules/17")]);
        let stage = Stage::new(EntityKind::Rules);
        let mut item = rule();

        process(&api, &stage, &mut item, None).await;

        assert_eq!(item.id(), Some(EntityId::new(17)));
    }

    #[tokio::test]
    async fn multiple_matches_count_as_not_found() {
        let api = ScriptedApi::new([
            ApiResponse::with_status(200, json!([{ "id": 1 }, { "id": 2 }])),
            created("/rules/3"),
        ]);
        let stage = Stage::new(EntityKind::Rules);
        let mut item = rule();

        let outcome = process(&api, &stage, &mut item, None).await;
        assert_eq!(outcome, ItemOutcome::Created { id: EntityId::new(3) });
    }

    #[tokio::test]
    async fn remote_configuration_failure_retries_find_once() {
        let api = ScriptedApi::new([
            ApiResponse::with_status(200, json!([])),
            remote_config_failure(),
            ApiResponse::with_status(200, json!([{ "id": 8 }])),
            ApiResponse::with_status(304, Value::Null),
        ]);
        let stage = Stage::new(EntityKind::ActionTargets);
        let mut item = Item::new(json!({ "name": "Slack" })).with_template("slack");
        item.resolve(&ctx()).unwrap();

        let outcome = process(&api, &stage, &mut item, Some(EntityId::new(2))).await;

        assert_eq!(outcome, ItemOutcome::Unchanged { id: EntityId::new(8) });
        assert_eq!(api.count("GET"), 2);
        assert_eq!(api.count("POST"), 1);
    }

    #[tokio::test]
    async fn recreated_entity_replaces_stale_id() {
        let api = ScriptedApi::new([
            ApiResponse::with_status(200, json!([{ "id": 8 }])),
            remote_config_failure(),
            ApiResponse::with_status(200, json!([])),
            created("/actionTargets/99"),
        ]);
        let stage = Stage::new(EntityKind::ActionTargets);
        let mut item = Item::new(json!({ "name": "Slack" })).with_template("slack");
        item.resolve(&ctx()).unwrap();

        let outcome = process(&api, &stage, &mut item, Some(EntityId::new(2))).await;

        assert_eq!(outcome, ItemOutcome::Created { id: EntityId::new(99) });
        assert_eq!(outcome.id(), item.id());
        let methods: Vec<_> = api.requests().iter().map(|r| r.method).collect();
        assert_eq!(methods, ["GET", "PATCH", "GET", "POST"]);
    }

    #[tokio::test]
    async fn failed_recreate_leaves_no_stale_id() {
        let api = ScriptedApi::new([
            ApiResponse::with_status(200, json!([{ "id": 8 }])),
            remote_config_failure(),
            ApiResponse::with_status(200, json!([])),
            ApiResponse::with_status(422, json!({ "message": "url is required" })),
        ]);
        let stage = Stage::new(EntityKind::ActionTargets);
        let mut item = Item::new(json!({ "name": "Slack" })).with_template("slack");

        let outcome = process(&api, &stage, &mut item, Some(EntityId::new(2))).await;

        assert!(outcome.is_create_failure());
        assert_eq!(item.id(), None);
    }

    #[tokio::test]
    async fn persistent_remote_failure_is_bounded() {
        let api = ScriptedApi::repeating(|req| match req.method {
            "GET" => ApiResponse::with_status(200, json!([])),
            _ => remote_config_failure(),
        });
        let stage = Stage::new(EntityKind::ActionTargets);
        let mut item = Item::new(json!({ "name": "Slack" })).with_template("slack");

        let outcome = process(&api, &stage, &mut item, Some(EntityId::new(2))).await;

        // One initial attempt plus three retries.
        assert_eq!(outcome, ItemOutcome::RetriesExhausted { attempts: 4 });
        assert_eq!(api.count("GET"), 4);
        assert_eq!(api.count("POST"), 4);
        assert_eq!(item.id(), None);
    }

    #[tokio::test]
    async fn update_remote_failure_is_bounded_too() {
        let api = ScriptedApi::repeating(|req| match req.method {
            "GET" => ApiResponse::with_status(200, json!([{ "id": 8 }])),
            _ => remote_config_failure(),
        });
        let stage = Stage::new(EntityKind::ActionTargets);
        let mut item = Item::new(json!({ "name": "Slack" })).with_template("slack");

        let outcome = EntityManager::new(&api, &stage, 1)
            .process(&mut item, Some(EntityId::new(2)), &ctx())
            .await
            .unwrap();

        assert_eq!(outcome, ItemOutcome::RetriesExhausted { attempts: 2 });
        assert_eq!(api.count("PATCH"), 2);
        assert_eq!(item.id(), Some(EntityId::new(8)));
    }

    #[tokio::test]
    async fn search_only_never_writes() {
        for lookup in [json!([]), json!([{ "id": 4 }])] {
            let api = ScriptedApi::new([ApiResponse::with_status(200, lookup.clone())]);
            let stage = Stage::new(EntityKind::EventSourceTemplates);
            let mut item = Item::new(json!({ "name": "PubliBike" })).search_only();

            let outcome = process(&api, &stage, &mut item, None).await;

            assert_eq!(api.count("POST") + api.count("PATCH"), 0);
            if lookup.as_array().unwrap().is_empty() {
                assert_eq!(outcome, ItemOutcome::NotFound);
                assert_eq!(item.id(), None);
            } else {
                assert_eq!(outcome, ItemOutcome::Found { id: EntityId::new(4) });
            }
        }
    }

    #[tokio::test]
    async fn search_only_stage_overrides_items() {
        let api = ScriptedApi::new([ApiResponse::with_status(200, json!([]))]);
        let stage = Stage {
            search_only: true,
            ..Stage::new(EntityKind::Rules)
        };
        let mut item = rule();

        let outcome = process(&api, &stage, &mut item, None).await;

        assert_eq!(outcome, ItemOutcome::NotFound);
        assert_eq!(api.requests().len(), 1);
    }

    #[tokio::test]
    async fn unexpected_create_status_is_a_create_failure() {
        let api = ScriptedApi::new([
            ApiResponse::with_status(200, json!([])),
            ApiResponse::with_status(422, json!({ "message": "name is required" })),
        ]);
        let stage = Stage::new(EntityKind::Rules);
        let mut item = rule();

        let outcome = process(&api, &stage, &mut item, None).await;

        assert_eq!(
            outcome,
            ItemOutcome::CreateFailed {
                status: 422,
                message: Some("name is required".into())
            }
        );
        assert!(outcome.is_create_failure());
        assert_eq!(item.id(), None);
    }

    #[tokio::test]
    async fn unexpected_update_status_continues() {
        let api = ScriptedApi::new([
            ApiResponse::with_status(200, json!([{ "id": 6 }])),
            ApiResponse::with_status(400, json!({ "message": "bad" })),
        ]);
        let stage = Stage::new(EntityKind::Rules);
        let mut item = rule();

        let outcome = process(&api, &stage, &mut item, None).await;

        assert_eq!(
            outcome,
            ItemOutcome::UpdateFailed {
                id: EntityId::new(6),
                status: 400
            }
        );
        assert!(!outcome.is_create_failure());
    }

    #[tokio::test]
    async fn missing_template_id_skips_requests() {
        let api = ScriptedApi::new(Vec::new());
        let stage = Stage::new(EntityKind::EventSources);
        let mut item = Item::new(json!({ "name": "Lausanne" })).with_template("publibike");

        let outcome = process(&api, &stage, &mut item, None).await;

        assert_eq!(
            outcome,
            ItemOutcome::UnresolvedTemplate {
                template: Some("publibike".into())
            }
        );
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn search_only_item_without_template_id_is_not_found() {
        let api = ScriptedApi::new(Vec::new());
        let stage = Stage::new(EntityKind::ActionTargets);
        let mut item = Item::new(json!({ "name": "Slack" }))
            .with_template("slack")
            .search_only();

        let outcome = process(&api, &stage, &mut item, None).await;

        assert_eq!(outcome, ItemOutcome::NotFound);
        assert!(!outcome.is_failure());
        assert!(api.requests().is_empty());
    }
}
