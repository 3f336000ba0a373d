// `vectorlink sync`: reconcile the vault with its remote index.

use std::path::Path;

use clap::Args;
use serde::Serialize;
use tracing::debug;
use vectorlink_engine::config::{GlobalConfig, VaultConfig};
use vectorlink_engine::sync::{SyncEngine, SyncReport, SyncStatus};

use crate::context::{self, VaultArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    vault: VaultArgs,

    /// Queue behind a sync that is already running instead of failing.
    #[arg(long)]
    wait: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub vault: String,
    #[serde(flatten)]
    pub report: SyncReport,
}

pub fn run(args: SyncArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match context::block_on(run_sync(&args, format)).and_then(|result| result) {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

async fn run_sync(args: &SyncArgs, format: OutputFormat) -> anyhow::Result<SyncResult> {
    let global = GlobalConfig::load();
    let root = args.vault.resolve(&global)?;
    let report = sync_vault(&root, &global, args.wait, format).await?;
    Ok(SyncResult { vault: root.display().to_string(), report })
}

async fn sync_vault(
    root: &Path,
    global: &GlobalConfig,
    wait: bool,
    format: OutputFormat,
) -> anyhow::Result<SyncReport> {
    let vault = VaultConfig::load(root)?;
    // Index id is checked before the key so an unbound vault says so first.
    vault.require_index_id()?;
    let settings = context::api_settings(global)?;
    let mut engine = SyncEngine::for_vault(root, &vault, settings)?;
    if format == OutputFormat::Human {
        engine = engine.with_observer(|path: &str, status: SyncStatus| {
            eprintln!("  {:<8} {path}", status.as_str());
        });
    }
    debug!(vault = %root.display(), wait, "starting sync");
    let report = if wait { engine.sync_queued().await? } else { engine.sync().await? };
    Ok(report)
}

fn format_human(result: &SyncResult) -> String {
    let report = &result.report;
    let mut lines = Vec::new();
    if report.applied() == 0 && report.is_clean() {
        lines.push(format!("{} is up to date.", result.vault));
    } else {
        lines.push(format!(
            "Synced {}: {} created, {} updated, {} deleted",
            result.vault, report.created, report.updated, report.deleted
        ));
    }
    if !report.is_clean() {
        lines.push(format!("  Failures ({}):", report.failures.len()));
        for failure in &report.failures {
            lines.push(format!(
                "    {} [{:?} at {}]: {}",
                failure.path, failure.action, failure.stage, failure.reason
            ));
        }
    }
    lines.join("\n")
}
