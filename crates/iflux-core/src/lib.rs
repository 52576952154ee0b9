//! Provisioning engine between `iflux-api` and the `iflux` CLI.
//!
//! This crate owns the find-or-create/update workflow that brings a
//! remote iFLUX instance in line with a declared set of entities:
//!
//! - **[`Runner`]** — Top-level orchestrator. Registers entity
//!   collections, authenticates (signing in, or registering then signing
//!   in), resolves the target organization and drives the stage chain.
//!
//! - **[`Stage`] chain** — Seven fixed stage descriptors, processed in
//!   dependency order: event source templates, event types, event
//!   sources, action target templates, action types, action targets and
//!   rules. Later stages reference ids assigned by earlier ones.
//!
//! - **[`EntityManager`]** — Generic find → create/update state machine
//!   applied to every item of a stage, including the bounded retry on the
//!   remote action target configuration race.
//!
//! - **Data model** ([`model`]) — [`Item`]s grouped into ordered
//!   [`Collection`]s, walked by a [`Cursor`]. Payloads are templates
//!   resolved against a [`ProvisioningContext`] once the organization id
//!   is known.
//!
//! - **[`Manifest`]** — YAML/JSON declaration of all collections plus
//!   run parameters, with offline validation.

pub mod config;
pub mod context;
pub mod cursor;
pub mod error;
pub mod manager;
pub mod manifest;
pub mod model;
pub mod payload;
pub mod report;
pub mod rules;
pub mod runner;
pub mod stage;

#[cfg(test)]
pub(crate) mod testing;

/// Version of the provisioning engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConnectionConfig, FailurePolicy, RunOptions, TlsVerification};
pub use context::{Params, ProvisioningContext};
pub use cursor::Cursor;
pub use error::CoreError;
pub use manager::{EntityManager, ItemOutcome, REMOTE_ACTION_TARGET_ERROR};
pub use manifest::{ItemSpec, Manifest, ManifestFormat, ManifestIssue};
pub use model::{Collection, DataCollections, EntityId, EntityKind, Item};
pub use payload::{Payload, Placeholders, Resolve};
pub use report::{Halt, ItemReport, RunReport, RunStatus, StageReport};
pub use runner::Runner;
pub use stage::{Extend, Stage};

pub use iflux_api::{IfluxClient, RestApi};
