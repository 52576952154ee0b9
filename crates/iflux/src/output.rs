//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use iflux_core::{RunReport, RunStatus};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Status word for the run summary: green, yellow or red.
pub fn paint_status(status: RunStatus, color: bool) -> String {
    let label: &'static str = status.into();
    if !color {
        return label.to_owned();
    }
    match status {
        RunStatus::Completed => label.green().bold().to_string(),
        RunStatus::CompletedWithFailures => label.yellow().bold().to_string(),
        RunStatus::Halted => label.red().bold().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable value in the chosen format.
///
/// Table rendering uses `detail_fn`, which returns a pre-formatted view.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Run report ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

/// Item table followed by a one-line summary.
pub fn report_table(report: &RunReport, color: bool) -> String {
    let rows: Vec<ItemRow> = report
        .stages
        .iter()
        .flat_map(|stage| {
            stage.items.iter().map(move |item| ItemRow {
                stage: if stage.search_only {
                    format!("{} (search)", stage.kind)
                } else {
                    stage.kind.to_string()
                },
                key: item.key.clone(),
                name: item.name.clone().unwrap_or_default(),
                outcome: item.outcome.to_string(),
            })
        })
        .collect();

    let mut out = if rows.is_empty() {
        String::from("No items provisioned.")
    } else {
        render_table(&rows)
    };
    out.push('\n');
    out.push_str(&report_summary(report, color));
    out
}

/// `completed: organization HEIG-VD (5), 12 items, 0 failed, 1.2s`
pub fn report_summary(report: &RunReport, color: bool) -> String {
    let millis = (report.finished_at - report.started_at).num_milliseconds().max(0);
    let mut line = format!(
        "{}: organization {} ({}), {} items, {} failed, {}.{}s",
        paint_status(report.status, color),
        report.organization,
        report.organization_id,
        report.items().count(),
        report.failure_count(),
        millis / 1000,
        millis % 1000 / 100,
    );
    if let Some(ref halt) = report.halted_at {
        line.push_str(&format!("\nhalted at {}/{}: {}", halt.kind, halt.key, halt.reason));
    }
    line
}

/// `kind/key<TAB>id` per item; items without an id print `-`.
pub fn report_plain(report: &RunReport) -> String {
    report
        .stages
        .iter()
        .flat_map(|stage| {
            stage.items.iter().map(move |item| {
                let id = item.outcome.id().map_or_else(|| "-".into(), |id| id.to_string());
                format!("{}/{}\t{id}", stage.kind, item.key)
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.expect("serialization should not fail")
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).expect("serialization should not fail")
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Entry {
        key: &'static str,
        id: u64,
    }

    #[derive(Tabled)]
    struct EntryRow {
        key: String,
    }

    fn entries() -> Vec<Entry> {
        vec![Entry { key: "publibike", id: 3 }, Entry { key: "slack", id: 7 }]
    }

    fn render(format: &OutputFormat) -> String {
        render_list(
            format,
            &entries(),
            |e| EntryRow { key: e.key.into() },
            |e| e.id.to_string(),
        )
    }

    #[test]
    fn plain_emits_one_id_per_line() {
        assert_eq!(render(&OutputFormat::Plain), "3\n7");
    }

    #[test]
    fn compact_json_is_single_line() {
        assert_eq!(
            render(&OutputFormat::JsonCompact),
            r#"[{"key":"publibike","id":3},{"key":"slack","id":7}]"#
        );
    }

    #[test]
    fn table_has_headers() {
        let table = render(&OutputFormat::Table);
        assert!(table.contains("key"));
        assert!(table.contains("publibike"));
    }

    #[test]
    fn uncolored_status_is_kebab_case() {
        assert_eq!(
            paint_status(RunStatus::CompletedWithFailures, false),
            "completed-with-failures"
        );
        assert!(paint_status(RunStatus::Halted, true).contains("halted"));
    }
}
