//! Configuration loading from disk and the command line.

use std::fs;
use std::path::Path;

use crate::config::schema::GatekeeperConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values supplied on the command line. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub limiter_enabled: Option<bool>,
    pub limiter_rps: Option<f64>,
    pub limiter_burst: Option<u32>,
    pub trusted_origins: Option<Vec<String>>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut GatekeeperConfig) {
        if let Some(bind_address) = self.bind_address {
            config.listener.bind_address = bind_address;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.limiter.enabled = enabled;
        }
        if let Some(rps) = self.limiter_rps {
            config.limiter.rps = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.limiter.burst = burst;
        }
        if let Some(origins) = self.trusted_origins {
            config.cors.trusted_origins = origins
                .into_iter()
                .flat_map(|o| o.split_whitespace().map(str::to_owned).collect::<Vec<_>>())
                .collect();
        }
    }
}

/// Load and validate configuration from a TOML file, without overrides.
pub fn load_config(path: &Path) -> Result<GatekeeperConfig, ConfigError> {
    resolve_config(Some(path), ConfigOverrides::default())
}

/// Build the effective configuration: file (or defaults), then overrides,
/// then validation of the result.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<GatekeeperConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => GatekeeperConfig::default(),
    };
    overrides.apply(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let mut config = GatekeeperConfig::default();
        ConfigOverrides {
            bind_address: Some("127.0.0.1:8000".into()),
            limiter_enabled: Some(false),
            limiter_rps: Some(10.0),
            limiter_burst: Some(20),
            trusted_origins: Some(vec!["https://a.example.com https://b.example.com".into()]),
        }
        .apply(&mut config);

        assert_eq!(config.listener.bind_address, "127.0.0.1:8000");
        assert!(!config.limiter.enabled);
        assert_eq!(config.limiter.rps, 10.0);
        assert_eq!(config.limiter.burst, 20);
        assert_eq!(
            config.cors.trusted_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }

    #[test]
    fn empty_overrides_keep_config() {
        let mut config = GatekeeperConfig::default();
        ConfigOverrides::default().apply(&mut config);
        assert_eq!(config.limiter.burst, 4);
    }

    #[test]
    fn invalid_overrides_fail_validation() {
        let overrides = ConfigOverrides {
            limiter_burst: Some(0),
            ..Default::default()
        };
        let err = resolve_config(None, overrides).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e == &vec![ValidationError::ZeroBurst]));
        assert_eq!(err.to_string(), "Validation failed: limiter.burst must be at least 1");
    }

    #[test]
    fn loads_file_from_disk() {
        let path = std::env::temp_dir().join(format!("gatekeeper-config-{}.toml", std::process::id()));
        fs::write(&path, "[limiter]\nrps = 5.0\nburst = 8\n").unwrap();

        let config = load_config(&path).unwrap();
        fs::remove_file(&path).unwrap_or_default();

        assert_eq!(config.limiter.rps, 5.0);
        assert_eq!(config.limiter.burst, 8);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn file_and_overrides_are_validated_together() {
        let path = std::env::temp_dir().join(format!("gatekeeper-zero-burst-{}.toml", std::process::id()));
        fs::write(&path, "[limiter]\nburst = 0\n").unwrap();

        let loaded = load_config(&path);
        let fixed = resolve_config(
            Some(&path),
            ConfigOverrides {
                limiter_burst: Some(6),
                ..Default::default()
            },
        );
        fs::remove_file(&path).unwrap_or_default();

        assert!(matches!(loaded, Err(ConfigError::Validation(ref e)) if e == &vec![ValidationError::ZeroBurst]));
        assert_eq!(fixed.unwrap().limiter.burst, 6);
    }
}
