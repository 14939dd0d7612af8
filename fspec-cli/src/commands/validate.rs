//! `fspec validate [--specs DIR]` — parse specs and report dangling
//! references without touching the cluster.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use fspec_apply::{loader, ResourceSet};
use fspec_core::SpecResource;

/// Parse the spec directory and report dangling references.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Spec directory to read.
    #[arg(long, default_value = "specs")]
    pub specs: PathBuf,
}

impl ValidateArgs {
    pub fn run(self) -> Result<()> {
        let resources = loader::load(&self.specs)
            .with_context(|| format!("read specs from '{}'", self.specs.display()))?;

        println!(
            "Parsed {} environments, {} packages, {} functions, {} triggers",
            resources.environments.len(),
            resources.packages.len(),
            resources.functions.len(),
            resources.http_triggers.len()
                + resources.kubernetes_watch_triggers.len()
                + resources.time_triggers.len()
                + resources.message_queue_triggers.len(),
        );

        let problems = dangling_references(&resources);
        if problems.is_empty() {
            println!("✓ No dangling references");
            return Ok(());
        }
        for problem in &problems {
            println!("⚠ {problem}");
        }
        anyhow::bail!("{} dangling reference(s)", problems.len());
    }
}

/// References that point at resources missing from the declared set.
///
/// Only intra-directory references are checked; a reference may be satisfied
/// by a resource that already exists on the cluster, which apply will
/// surface instead.
fn dangling_references(resources: &ResourceSet) -> Vec<String> {
    let environments: BTreeSet<_> = resources
        .environments
        .iter()
        .map(|e| e.metadata.key())
        .collect();
    let packages: BTreeSet<_> = resources.packages.iter().map(|p| p.metadata.key()).collect();
    let functions: BTreeSet<_> = resources
        .functions
        .iter()
        .map(|f| f.metadata.name.clone())
        .collect();

    let mut problems = Vec::new();

    for function in &resources.functions {
        let env = &function.spec.environment;
        if !environments.contains(&(env.namespace.clone(), env.name.clone())) {
            problems.push(format!(
                "function {} references undeclared environment {}/{}",
                function.metadata, env.namespace, env.name
            ));
        }
        let pkg = &function.spec.package.package_ref;
        if !packages.contains(&(pkg.namespace.clone(), pkg.name.clone())) {
            problems.push(format!(
                "function {} references undeclared package {}/{}",
                function.metadata, pkg.namespace, pkg.name
            ));
        }
    }

    let mut check_function_ref = |kind: &'static str, meta: &fspec_core::Metadata, name: &str| {
        if !functions.contains(name) {
            problems.push(format!(
                "{kind} {meta} references undeclared function {name}"
            ));
        }
    };
    for t in &resources.http_triggers {
        check_function_ref(
            fspec_core::HttpTrigger::KIND,
            &t.metadata,
            &t.spec.function_reference.name,
        );
    }
    for t in &resources.kubernetes_watch_triggers {
        check_function_ref(
            fspec_core::KubernetesWatchTrigger::KIND,
            &t.metadata,
            &t.spec.function_reference.name,
        );
    }
    for t in &resources.time_triggers {
        check_function_ref(
            fspec_core::TimeTrigger::KIND,
            &t.metadata,
            &t.spec.function_reference.name,
        );
    }
    for t in &resources.message_queue_triggers {
        check_function_ref(
            fspec_core::MessageQueueTrigger::KIND,
            &t.metadata,
            &t.spec.function_reference.name,
        );
    }

    problems
}
