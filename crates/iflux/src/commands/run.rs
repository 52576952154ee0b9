//! `iflux run`: provision a manifest against the configured instance.

use serde::Serialize;
use tabled::Tabled;

use iflux_core::{
    EntityId, EntityKind, FailurePolicy, IfluxClient, Params, RunOptions, RunReport, RunStatus,
    Runner,
};

use crate::cli::{GlobalOpts, OnFailure, RunArgs};
use crate::commands::{parse_value, read_manifest};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionEntry {
    kind: EntityKind,
    key: String,
    name: Option<String>,
    id: Option<EntityId>,
}

#[derive(Tabled)]
struct CollectionRow {
    #[tabled(rename = "Collection")]
    collection: &'static str,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Id")]
    id: String,
}

pub async fn handle(args: RunArgs, global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let manifest = read_manifest(&args.manifest)?;
    let issues = manifest.validate();
    if !issues.is_empty() {
        for issue in &issues {
            tracing::error!("{issue}");
        }
        return Err(CliError::ManifestInvalid {
            path: args.manifest.display().to_string(),
            count: issues.len(),
        });
    }

    let cfg = config::load_config_or_default();
    let session = config::resolve_session(global, &cfg)?;
    let organization = session.organization.ok_or_else(|| CliError::Validation {
        field: "organization".into(),
        reason: "set it in the profile or pass --organization".into(),
    })?;
    tracing::debug!(profile = %session.profile_name, %organization, "session resolved");

    let options = RunOptions::new(organization)
        .with_failure_policy(match args.on_create_failure {
            OnFailure::Halt => FailurePolicy::Halt,
            OnFailure::Skip => FailurePolicy::Skip,
        })
        .with_max_retries(args.max_retries)
        .with_search_only(search_only_kinds(&args.search_only)?);

    // Manifest params < profile params < --param.
    let overrides: Params = args
        .params
        .iter()
        .map(|(name, value)| (name.clone(), parse_value(value)))
        .collect();

    let mut runner = Runner::new(session.connection.connect()?);
    runner
        .add_manifest(manifest)
        .add_params(session.params)
        .add_params(overrides);

    let report = runner.run(&options).await?;

    let out = output::render_single(
        &global.output,
        &report,
        |r| output::report_table(r, color),
        output::report_plain,
    );
    output::print_output(&out, global.quiet);

    if args.show_collections {
        print_collections(&runner, global);
    }

    outcome(&report)
}

fn search_only_kinds(raw: &[String]) -> Result<Vec<EntityKind>, CliError> {
    raw.iter()
        .map(|kind| {
            kind.parse().map_err(|_| CliError::Validation {
                field: "search-only".into(),
                reason: format!("unknown entity kind '{kind}'"),
            })
        })
        .collect()
}

fn print_collections(runner: &Runner<IfluxClient>, global: &GlobalOpts) {
    let entries: Vec<CollectionEntry> = runner
        .collections()
        .iter()
        .flat_map(|(kind, collection)| {
            collection.iter().map(move |(key, item)| CollectionEntry {
                kind,
                key: key.to_owned(),
                name: item.name().map(ToOwned::to_owned),
                id: item.id(),
            })
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &entries,
        |e| CollectionRow {
            collection: e.kind.collection_name(),
            key: e.key.clone(),
            name: e.name.clone().unwrap_or_default(),
            id: e.id.map_or_else(|| "-".into(), |id| id.to_string()),
        },
        |e| format!("{}/{}", e.kind, e.key),
    );
    output::print_output(&out, global.quiet);
}

/// Exit status follows the run status.
fn outcome(report: &RunReport) -> Result<(), CliError> {
    match report.status {
        RunStatus::Completed => Ok(()),
        RunStatus::CompletedWithFailures => Err(CliError::Partial {
            failures: report.failure_count(),
        }),
        RunStatus::Halted => {
            let (kind, key, reason) = report.halted_at.as_ref().map_or_else(
                || (String::new(), String::new(), "halted".into()),
                |halt| (halt.kind.to_string(), halt.key.clone(), halt.reason.clone()),
            );
            Err(CliError::Halted { kind, key, reason })
        }
    }
}
