// `vectorlink status`: compare the vault with its index without syncing.

use clap::Args;
use serde::Serialize;
use vectorlink_engine::config::{GlobalConfig, VaultConfig};
use vectorlink_engine::sync::{SyncEngine, SyncStatus};

use crate::context::{self, VaultArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    vault: VaultArgs,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub vault: String,
    pub documents: Vec<DocumentStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatus {
    pub path: String,
    pub status: SyncStatus,
}

impl StatusResult {
    fn out_of_sync(&self) -> impl Iterator<Item = &DocumentStatus> {
        self.documents.iter().filter(|doc| doc.status != SyncStatus::Synced)
    }
}

pub fn run(args: StatusArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match context::block_on(call_status(&args)).and_then(|result| result) {
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

async fn call_status(args: &StatusArgs) -> anyhow::Result<StatusResult> {
    let global = GlobalConfig::load();
    let root = args.vault.resolve(&global)?;
    let vault = VaultConfig::load(&root)?;
    vault.require_index_id()?;
    let engine = SyncEngine::for_vault(&root, &vault, context::api_settings(&global)?)?;
    let documents = engine
        .refresh_status()
        .await?
        .into_iter()
        .map(|(path, status)| DocumentStatus { path, status })
        .collect();
    Ok(StatusResult { vault: root.display().to_string(), documents })
}

fn format_human(result: &StatusResult) -> String {
    let mut lines = vec![result.vault.clone()];
    if result.documents.is_empty() {
        lines.push("  No markdown documents.".into());
        return lines.join("\n");
    }

    let pending: Vec<_> = result.out_of_sync().collect();
    let synced = result.documents.len() - pending.len();
    lines.push(format!("  {synced}/{} documents synced", result.documents.len()));
    for doc in pending {
        lines.push(format!("    {:<12} {}", doc.status.as_str(), doc.path));
    }
    lines.join("\n")
}
