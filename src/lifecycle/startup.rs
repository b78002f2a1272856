//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration and apply command-line overrides
//! - Build the identity and permission collaborators
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::path::Path;

use crate::config::{resolve_config, ConfigError, ConfigOverrides, GatekeeperConfig, StoreConfig};
use crate::identity::memory::SeedError;
use crate::identity::MemoryStore;
use crate::security::Collaborators;

/// Load the effective configuration.
pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<GatekeeperConfig, ConfigError> {
    let config = resolve_config(config_path, overrides)?;
    tracing::debug!(config = ?config, "Configuration resolved");
    Ok(config)
}

/// Build the collaborators from the store section, seeding from a file when
/// one is configured.
pub fn collaborators(config: &StoreConfig) -> Result<Collaborators, SeedError> {
    let store = match &config.seed_path {
        Some(path) => MemoryStore::load_from_file(path)?,
        None => {
            tracing::warn!("No seed file configured, every bearer token will be rejected");
            MemoryStore::new()
        }
    };
    Ok(Collaborators::memory(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn defaults_without_a_file() {
        let config = load(None, ConfigOverrides::default()).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
    }

    #[test]
    fn missing_seed_file_is_an_error() {
        let config = StoreConfig {
            seed_path: Some(PathBuf::from("/nonexistent/gatekeeper-seed.json")),
        };
        assert!(matches!(collaborators(&config), Err(SeedError::Io(_))));
    }

    #[test]
    fn no_seed_file_gives_an_empty_store() {
        assert!(collaborators(&StoreConfig::default()).is_ok());
    }
}
