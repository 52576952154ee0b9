//! `iflux validate`: offline manifest checks.

use serde::Serialize;
use tabled::Tabled;

use iflux_core::{EntityKind, ManifestIssue};

use crate::cli::{GlobalOpts, ValidateArgs};
use crate::commands::read_manifest;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "Problem")]
    message: String,
}

#[derive(Serialize)]
struct Counts {
    kind: EntityKind,
    items: usize,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Collection")]
    kind: String,
    #[tabled(rename = "Items")]
    items: usize,
}

pub fn handle(args: &ValidateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let manifest = read_manifest(&args.manifest)?;
    let issues = manifest.validate();

    if issues.is_empty() {
        let counts: Vec<Counts> = EntityKind::ALL
            .iter()
            .map(|&kind| Counts {
                kind,
                items: manifest.declared(kind).len(),
            })
            .filter(|c| c.items > 0)
            .collect();
        let out = output::render_list(
            &global.output,
            &counts,
            |c| CountRow {
                kind: c.kind.to_string(),
                items: c.items,
            },
            |c| format!("{}\t{}", c.kind, c.items),
        );
        output::print_output(&out, global.quiet);
        if !global.quiet {
            eprintln!(
                "✓ {} is valid: {} items, {} params",
                args.manifest.display(),
                manifest.item_count(),
                manifest.params.len()
            );
        }
        return Ok(());
    }

    let out = output::render_list(
        &global.output,
        &issues,
        |issue: &ManifestIssue| IssueRow {
            item: format!("{}/{}", issue.kind, issue.key),
            message: issue.message.clone(),
        },
        ToString::to_string,
    );
    output::print_output(&out, global.quiet);

    Err(CliError::ManifestInvalid {
        path: args.manifest.display().to_string(),
        count: issues.len(),
    })
}
