// `vectorlink init`: bind a vault to a remote index.

use std::path::Path;

use anyhow::{bail, Context};
use clap::Args;
use serde::Serialize;
use vectorlink_engine::config::{vault_config_path, GlobalConfig, VaultConfig};

use crate::context::VaultArgs;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct InitArgs {
    #[command(flatten)]
    vault: VaultArgs,

    /// Identifier of the remote index (vector store) to sync into.
    #[arg(long, value_name = "ID")]
    index_id: String,

    /// Also make this the vault used when `--vault` is omitted.
    #[arg(long)]
    default: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub vault: String,
    pub index_id: String,
    pub config_path: String,
    pub default: bool,
}

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match init(&args) {
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

fn init(args: &InitArgs) -> anyhow::Result<InitResult> {
    let mut global = GlobalConfig::load();
    let root = args.vault.resolve(&global)?;
    let root = root
        .canonicalize()
        .with_context(|| format!("failed to resolve vault `{}`", root.display()))?;
    let result = write_vault_config(&root, &args.index_id)?;

    if args.default {
        global.vault_root = Some(root);
        global.save()?;
    }
    Ok(InitResult { default: args.default, ..result })
}

fn write_vault_config(root: &Path, index_id: &str) -> anyhow::Result<InitResult> {
    let index_id = index_id.trim();
    if index_id.is_empty() {
        bail!("index id must not be empty");
    }
    let config = VaultConfig { index_id: Some(index_id.to_string()) };
    config.save(root)?;
    Ok(InitResult {
        vault: root.display().to_string(),
        index_id: index_id.to_string(),
        config_path: vault_config_path(root).display().to_string(),
        default: false,
    })
}

fn format_human(result: &InitResult) -> String {
    let mut text = format!(
        "Vault {} now syncs into index {}\n  config: {}",
        result.vault, result.index_id, result.config_path
    );
    if result.default {
        text.push_str("\n  set as default vault");
    }
    text
}
