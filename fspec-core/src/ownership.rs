//! Deployment ownership annotations.
//!
//! Ownership is carried in two resource annotations and decided solely by
//! UID equality: renaming a deployment does not change what it owns, and a
//! hand-edited UID annotation makes a resource invisible to apply. That is
//! the operator's escape hatch; nothing here tries to prevent it.

use crate::types::{DeploymentConfig, Metadata, DEPLOYMENT_NAME_KEY, DEPLOYMENT_UID_KEY};

/// Write the ownership annotations so future applies can find the resource.
pub fn stamp(metadata: &mut Metadata, config: &DeploymentConfig) {
    metadata
        .annotations
        .insert(DEPLOYMENT_NAME_KEY.to_string(), config.name.clone());
    metadata
        .annotations
        .insert(DEPLOYMENT_UID_KEY.to_string(), config.uid.clone());
}

/// True iff the resource carries this deployment's UID annotation.
pub fn is_owned_by(metadata: &Metadata, config: &DeploymentConfig) -> bool {
    metadata
        .annotations
        .get(DEPLOYMENT_UID_KEY)
        .is_some_and(|uid| uid == &config.uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeploymentConfig {
        DeploymentConfig::new("demo", "4b52f2a1-9f68-4f4c-8c7d-9a17e1a3b6c2")
    }

    #[test]
    fn stamp_writes_both_annotations() {
        let cfg = config();
        let mut m = Metadata::named("default", "hello");
        stamp(&mut m, &cfg);
        assert_eq!(
            m.annotations.get(DEPLOYMENT_NAME_KEY),
            Some(&"demo".to_string())
        );
        assert_eq!(m.annotations.get(DEPLOYMENT_UID_KEY), Some(&cfg.uid));
    }

    #[test]
    fn unannotated_resource_is_not_owned() {
        let m = Metadata::named("default", "hello");
        assert!(!is_owned_by(&m, &config()));
    }

    #[test]
    fn ownership_is_uid_equality_not_name() {
        let cfg = config();
        let mut m = Metadata::named("default", "hello");
        stamp(&mut m, &cfg);

        // Same name, different UID: not owned.
        let other = DeploymentConfig::new("demo", "ffffffff-0000-0000-0000-000000000000");
        assert!(!is_owned_by(&m, &other));

        // Different name, same UID: still owned.
        let renamed = DeploymentConfig::new("demo-renamed", cfg.uid.clone());
        assert!(is_owned_by(&m, &renamed));
    }

    #[test]
    fn stamp_then_check_roundtrips() {
        let cfg = config();
        let mut m = Metadata::named("default", "hello");
        stamp(&mut m, &cfg);
        assert!(is_owned_by(&m, &cfg));
    }
}
