// `vectorlink setup`: API key and global connection settings.

use anyhow::bail;
use clap::Args;
use serde::Serialize;
use vectorlink_engine::config::{global_config_path, ApiSettings, GlobalConfig};
use vectorlink_engine::security;

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct SetupArgs {
    /// Store this API key in the OS keychain.
    #[arg(long, value_name = "KEY", conflicts_with = "clear_api_key")]
    api_key: Option<String>,

    /// Remove the API key from the OS keychain.
    #[arg(long)]
    clear_api_key: bool,

    /// Base URL of the API.
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Organization sent with every request; pass "" to clear.
    #[arg(long, value_name = "ID")]
    organization: Option<String>,

    /// Project sent with every request; pass "" to clear.
    #[arg(long, value_name = "ID")]
    project: Option<String>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupResult {
    pub config_path: Option<String>,
    pub api_base_url: String,
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
    pub api_key: KeyState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Stored,
    Cleared,
    Present,
    Missing,
}

pub fn run(args: SetupArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match setup(args) {
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

fn setup(args: SetupArgs) -> anyhow::Result<SetupResult> {
    let mut global = GlobalConfig::load();
    if apply_settings(&mut global, &args)? {
        global.save()?;
    }

    let api_key = if let Some(key) = args.api_key.as_deref() {
        security::store_api_key(key)?;
        KeyState::Stored
    } else if args.clear_api_key {
        security::delete_api_key()?;
        KeyState::Cleared
    } else if security::resolve_api_key()?.is_some() {
        KeyState::Present
    } else {
        KeyState::Missing
    };

    Ok(SetupResult {
        config_path: global_config_path().map(|p| p.display().to_string()),
        api_base_url: global.api_base_url,
        organization_id: global.organization_id,
        project_id: global.project_id,
        api_key,
    })
}

/// Apply flag overrides to `global`. Returns whether anything changed.
fn apply_settings(global: &mut GlobalConfig, args: &SetupArgs) -> anyhow::Result<bool> {
    let before = global.clone();
    if let Some(url) = args.base_url.as_deref() {
        let url = url.trim();
        if url.is_empty() {
            bail!("base URL must not be empty");
        }
        global.api_base_url = url.to_string();
        // Validate with a placeholder key; the real one may not exist yet.
        ApiSettings::resolve(global, Some("placeholder".to_string()))?;
    }
    if let Some(org) = args.organization.as_deref() {
        global.organization_id = non_blank(org);
    }
    if let Some(project) = args.project.as_deref() {
        global.project_id = non_blank(project);
    }
    Ok(*global != before)
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn format_human(result: &SetupResult) -> String {
    let key = match result.api_key {
        KeyState::Stored => "stored in keychain",
        KeyState::Cleared => "removed from keychain",
        KeyState::Present => "configured",
        KeyState::Missing => "missing (run: vectorlink setup --api-key <KEY>)",
    };
    let mut lines = vec![
        format!("API: {}", result.api_base_url),
        format!("  API key: {key}"),
    ];
    if let Some(org) = &result.organization_id {
        lines.push(format!("  Organization: {org}"));
    }
    if let Some(project) = &result.project_id {
        lines.push(format!("  Project: {project}"));
    }
    if let Some(path) = &result.config_path {
        lines.push(format!("  Config: {path}"));
    }
    lines.join("\n")
}
