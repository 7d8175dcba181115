//! # Relay Configuration Loading
//!
//! Precedence, lowest first: built-in defaults, the TOML file, `RELAY_*`
//! environment variables, command-line flags. The result is validated once
//! every layer is applied.

use sensor_gateway::{ConfigError, RelayConfig};
use std::path::Path;

/// Command-line overrides of `relay-node run`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
}

/// Build the effective configuration from the process environment.
pub fn load_config(path: Option<&Path>, cli: CliOverrides) -> Result<RelayConfig, ConfigError> {
    load_config_with(path, cli, |var| std::env::var(var).ok())
}

/// Same as [`load_config`] with an explicit variable lookup.
pub fn load_config_with<F>(
    path: Option<&Path>,
    cli: CliOverrides,
    lookup: F,
) -> Result<RelayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };

    config.apply_overrides(lookup)?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }

    config.validate()?;
    Ok(config)
}
