//! `fspec init [--specs DIR] [--name NAME]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use uuid::Uuid;

use fspec_core::DeploymentConfig;

pub const CONFIG_FILE: &str = "fission-config.yaml";

/// Create a spec directory with a fresh deployment config.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Spec directory to create.
    #[arg(long, default_value = "specs")]
    pub specs: PathBuf,

    /// Deployment name; defaults to the current directory's basename.
    #[arg(long)]
    pub name: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let name = match self.name {
            Some(name) => name,
            None => default_deployment_name()?,
        };

        println!("Creating spec directory '{}'", self.specs.display());
        std::fs::create_dir_all(&self.specs)
            .with_context(|| format!("create spec directory '{}'", self.specs.display()))?;

        let config_path = self.specs.join(CONFIG_FILE);
        if config_path.exists() {
            // The UID is the ownership tag for every resource this
            // deployment ever created; overwriting it would orphan them all.
            bail!(
                "'{}' already exists; delete it first if you really want a new deployment identity",
                config_path.display()
            );
        }

        // Every resource is annotated with this UID on apply, which makes
        // repeated applies idempotent and lets --delete find removed specs.
        let config = DeploymentConfig::new(name, Uuid::new_v4().to_string());
        let yaml = serde_yaml::to_string(&config).context("serialize deployment config")?;
        std::fs::write(&config_path, yaml)
            .with_context(|| format!("write '{}'", config_path.display()))?;

        println!("✓ Deployment '{}' initialized ({})", config.name, config.uid);
        Ok(())
    }
}

fn default_deployment_name() -> Result<String> {
    let cwd = std::env::current_dir().context("get current working directory")?;
    let basename = cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "deployment".to_string());
    Ok(sanitize_name(&basename))
}

/// Lowercase the name and squeeze anything outside `[a-z0-9-]` into single
/// dashes, so it is usable as a resource label.
fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_dash = true;
    for c in raw.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "deployment".to_string()
    } else {
        out
    }
}
