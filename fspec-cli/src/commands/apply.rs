//! `fspec apply [--specs DIR] [--server URL] [--delete]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use fspec_apply::{loader, pipeline, ApplyReport};
use fspec_core::HttpClient;

/// Reconcile the spec directory against the cluster.
///
/// Idempotent, and deliberately not transactional: if the run is
/// interrupted, earlier kinds' writes stay committed and re-running apply
/// converges the rest.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Spec directory to read.
    #[arg(long, default_value = "specs")]
    pub specs: PathBuf,

    /// Control-plane URL.
    #[arg(long, default_value = "http://localhost:8888")]
    pub server: String,

    /// Delete resources this deployment owns that are no longer declared.
    #[arg(long)]
    pub delete: bool,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let mut resources = loader::load(&self.specs)
            .with_context(|| format!("read specs from '{}'", self.specs.display()))?;

        println!(
            "Specification has: {} archives, {} functions, {} environments, {} HTTP triggers",
            resources.archive_upload_specs.len(),
            resources.functions.len(),
            resources.environments.len(),
            resources.http_triggers.len(),
        );

        let client = HttpClient::new(&self.server).context("build control-plane client")?;
        let report = pipeline::apply(&client, &self.specs, &mut resources, self.delete)
            .context("apply specs")?;

        print_report(&report);
        Ok(())
    }
}

pub(crate) fn print_report(report: &ApplyReport) {
    for summary in &report.summaries {
        if summary.unchanged() {
            println!("{}s: no changes needed", summary.kind);
        } else {
            println!(
                "{}s: {} created, {} updated, {} deleted",
                summary.kind, summary.created, summary.updated, summary.deleted
            );
        }
    }
}
