// ── Runner ──
//
// Owns the collections and params of a run and drives it: base URL,
// authentication, organization, payload preparation, then the stage
// chain in order. Requests go out one at a time.

use chrono::Utc;
use secrecy::SecretString;
use serde_json::json;
use tracing::{debug, error, info, warn};
use url::Url;

use iflux_api::auth::{REGISTER_PATH, SIGNIN_PATH};
use iflux_api::{Credentials, RestApi, SignIn, StatusCode};

use crate::config::{FailurePolicy, RunOptions};
use crate::context::{Params, ProvisioningContext};
use crate::error::CoreError;
use crate::manager::EntityManager;
use crate::manifest::Manifest;
use crate::model::{Collection, DataCollections, EntityId, EntityKind};
use crate::report::{Halt, ItemReport, RunReport, RunStatus, StageReport};
use crate::rules::prepare_rules;
use crate::stage::{self, Stage};

const ORGANIZATIONS_PATH: &str = "/organizations";

/// Provisioning orchestrator over a [`RestApi`].
pub struct Runner<A> {
    api: A,
    collections: DataCollections,
    params: Params,
}

impl<A: RestApi> Runner<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            collections: DataCollections::default(),
            params: Params::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn collections(&self) -> &DataCollections {
        &self.collections
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register the collection for `kind`. A kind can only be registered
    /// once; later registrations are logged and ignored.
    pub fn add_collection(&mut self, kind: EntityKind, collection: Collection) -> &mut Self {
        self.collections.register(kind, collection);
        self
    }

    pub fn add_event_source_templates(&mut self, collection: Collection) -> &mut Self {
        self.add_collection(EntityKind::EventSourceTemplates, collection)
    }

    pub fn add_event_types(&mut self, collection: Collection) -> &mut Self {
        self.add_collection(EntityKind::EventTypes, collection)
    }

    pub fn add_event_sources(&mut self, collection: Collection) -> &mut Self {
        self.add_collection(EntityKind::EventSources, collection)
    }

    pub fn add_action_target_templates(&mut self, collection: Collection) -> &mut Self {
        self.add_collection(EntityKind::ActionTargetTemplates, collection)
    }

    pub fn add_action_types(&mut self, collection: Collection) -> &mut Self {
        self.add_collection(EntityKind::ActionTypes, collection)
    }

    pub fn add_action_targets(&mut self, collection: Collection) -> &mut Self {
        self.add_collection(EntityKind::ActionTargets, collection)
    }

    pub fn add_rules(&mut self, collection: Collection) -> &mut Self {
        self.add_collection(EntityKind::Rules, collection)
    }

    /// Merge params; later values win.
    pub fn add_params(&mut self, params: Params) -> &mut Self {
        for name in params.names() {
            if self.params.get(name).is_some() {
                debug!(param = name, "param overridden");
            }
        }
        self.params.extend(params);
        self
    }

    /// Register every collection and param a manifest declares.
    pub fn add_manifest(&mut self, manifest: Manifest) -> &mut Self {
        let (collections, params) = manifest.into_parts();
        for (kind, collection) in collections {
            self.add_collection(kind, collection);
        }
        self.add_params(params)
    }

    // ── Run ──────────────────────────────────────────────────────────

    /// Provision everything registered so far.
    ///
    /// Item-level failures end up in the report; the returned error is
    /// reserved for failures that make the run impossible (no base URL,
    /// no session, no organization, transport errors).
    pub async fn run(&mut self, options: &RunOptions) -> Result<RunReport, CoreError> {
        let started_at = Utc::now();
        let stages = stage::chain(&options.search_only);

        let base_url = self.configure(options)?;
        self.authenticate(options).await?;
        let organization_id = self.resolve_organization(&options.organization).await?;

        let ctx = ProvisioningContext::new(organization_id, base_url, self.params.clone());
        self.prepare_payloads(&stages, &ctx)?;

        let mut reports = Vec::with_capacity(stages.len());
        let mut halted_at = None;

        for stage in &stages {
            let (report, halt) = self.run_stage(stage, &ctx, options).await?;
            reports.push(report);
            if halt.is_some() {
                halted_at = halt;
                break;
            }
        }

        self.log_collections();

        let status = if halted_at.is_some() {
            RunStatus::Halted
        } else {
            RunReport::settle(&reports)
        };
        info!(%status, organization_id = %organization_id, "run finished");

        Ok(RunReport {
            organization: options.organization.clone(),
            organization_id,
            started_at,
            finished_at: Utc::now(),
            status,
            halted_at,
            stages: reports,
        })
    }

    fn configure(&self, options: &RunOptions) -> Result<Url, CoreError> {
        let raw = self.params.require_str(&options.base_url_param)?;
        let url = Url::parse(raw).map_err(|e| CoreError::InvalidParam {
            name: options.base_url_param.clone(),
            reason: e.to_string(),
        })?;
        info!(base_url = %url, "API configured");
        self.api.configure(url.clone());
        Ok(url)
    }

    // ── Session ──────────────────────────────────────────────────────

    async fn authenticate(&self, options: &RunOptions) -> Result<(), CoreError> {
        let email = self.params.require_str(&options.user_param)?;
        let password = self.params.require_str(&options.password_param)?;
        let credentials = Credentials::new(email, SecretString::from(password.to_owned()));

        let token = match self.sign_in(&credentials).await? {
            SignIn::Token(token) => token,
            SignIn::Unauthorized => {
                warn!(email, "sign-in refused, registering the account");
                self.register(&credentials).await?;
                match self.sign_in(&credentials).await? {
                    SignIn::Token(token) => token,
                    SignIn::Unauthorized => {
                        return Err(CoreError::AuthenticationFailed {
                            message: "sign-in refused after registration".into(),
                        });
                    }
                    SignIn::Rejected { status, body } => {
                        return Err(sign_in_rejected(status, &body));
                    }
                }
            }
            SignIn::Rejected { status, body } => return Err(sign_in_rejected(status, &body)),
        };

        self.api.install_bearer_token(token);
        info!(email, "signed in");
        Ok(())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<SignIn, CoreError> {
        let resp = self.api.post(SIGNIN_PATH, &credentials.signin_body()).await?;
        Ok(SignIn::from_response(&resp)?)
    }

    async fn register(&self, credentials: &Credentials) -> Result<(), CoreError> {
        let resp = self
            .api
            .post(REGISTER_PATH, &credentials.registration_body())
            .await?;

        if resp.status == StatusCode::CREATED {
            info!(email = %credentials.email, "user registered");
            return Ok(());
        }
        error!(status = resp.status.as_u16(), body = %resp.body, "unable to register the user");
        Err(CoreError::RegistrationFailed {
            status: resp.status.as_u16(),
            message: body_message(&resp.body),
        })
    }

    /// Look the organization up by name, creating it when absent.
    async fn resolve_organization(&self, name: &str) -> Result<EntityId, CoreError> {
        let resp = self.api.get(ORGANIZATIONS_PATH, &[("name", name)]).await?;
        if let Some(id) = resp.single_match_id() {
            let id = EntityId::new(id);
            info!(organization = name, %id, "organization found");
            return Ok(id);
        }

        info!(organization = name, "organization not found, creating it");
        let resp = self
            .api
            .post(ORGANIZATIONS_PATH, &json!({ "name": name }))
            .await?;

        if resp.status != StatusCode::CREATED {
            error!(organization = name, status = resp.status.as_u16(), "unable to create the organization");
            return Err(CoreError::OrganizationFailed {
                name: name.into(),
                status: resp.status.as_u16(),
                message: body_message(&resp.body),
            });
        }

        let id = resp
            .location_id()
            .map(EntityId::new)
            .map_err(|e| CoreError::OrganizationFailed {
                name: name.into(),
                status: resp.status.as_u16(),
                message: e.to_string(),
            })?;
        info!(organization = name, %id, "organization created");
        Ok(id)
    }

    // ── Stages ───────────────────────────────────────────────────────

    /// Resolve the payloads of every writable item outside the rules
    /// stage. Rules wait until the ids they reference exist.
    fn prepare_payloads(&mut self, stages: &[Stage], ctx: &ProvisioningContext) -> Result<(), CoreError> {
        for stage in stages.iter().filter(|s| s.kind != EntityKind::Rules && !s.search_only) {
            let Some(collection) = self.collections.get_mut(stage.kind) else {
                continue;
            };
            for (key, item) in collection.iter_mut() {
                if item.is_search_only() {
                    continue;
                }
                item.resolve(ctx).map_err(|e| CoreError::Payload {
                    item: format!("{}/{key}", stage.kind),
                    message: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    async fn run_stage(
        &mut self,
        stage: &Stage,
        ctx: &ProvisioningContext,
        options: &RunOptions,
    ) -> Result<(StageReport, Option<Halt>), CoreError> {
        let mut report = StageReport::new(stage.kind, stage.search_only);

        if stage.kind == EntityKind::Rules && !stage.search_only {
            let unresolved = prepare_rules(&mut self.collections, ctx)?;
            if unresolved > 0 {
                warn!(unresolved, "some rule references could not be resolved");
            }
        }

        let Some(cursor) = self.collections.get(stage.kind).map(Collection::cursor) else {
            debug!(collection = stage.kind.collection_name(), "nothing to provision");
            return Ok((report, None));
        };

        info!(
            collection = stage.kind.collection_name(),
            items = cursor.remaining(),
            search_only = stage.search_only,
            "stage started"
        );
        let manager = EntityManager::new(&self.api, stage, options.max_retries);

        for key in cursor {
            let template_id = self.collections.template_id(stage.kind, &key);
            let Some(item) = self
                .collections
                .get_mut(stage.kind)
                .and_then(|c| c.get_mut(&key))
            else {
                continue;
            };

            let outcome = manager.process(item, template_id, ctx).await?;
            let halt = outcome.is_create_failure()
                && options.on_create_failure == FailurePolicy::Halt;
            let reason = outcome.to_string();

            report.items.push(ItemReport {
                key: key.clone(),
                name: item.name().map(String::from),
                outcome,
            });

            if halt {
                error!(
                    collection = stage.kind.collection_name(),
                    key,
                    reason,
                    "halting the run"
                );
                return Ok((
                    report,
                    Some(Halt {
                        kind: stage.kind,
                        key,
                        reason,
                    }),
                ));
            }
        }

        Ok((report, None))
    }

    /// Dump every collection with the ids the run assigned.
    fn log_collections(&self) {
        for (kind, collection) in self.collections.iter() {
            info!(collection = kind.collection_name(), items = collection.len(), "collection");
            for (key, item) in collection.iter() {
                info!(
                    collection = kind.collection_name(),
                    key,
                    name = item.name().unwrap_or_default(),
                    id = ?item.id().map(EntityId::get),
                    "item"
                );
                debug!(key, data = %item.data(), "payload");
            }
        }
    }
}

fn body_message(body: &serde_json::Value) -> String {
    body.get("message")
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| body.to_string(), String::from)
}

fn sign_in_rejected(status: u16, body: &serde_json::Value) -> CoreError {
    CoreError::AuthenticationFailed {
        message: format!("sign-in answered HTTP {status}: {}", body_message(body)),
    }
}
