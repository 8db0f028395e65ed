use std::fs;
use tracing::{debug, error, info};

use crate::types::role::Role;
use crate::types::server_config::{AppConfig, ConfigError};

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    parse_config(&contents)
}

/// Parse and validate a TOML document.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;

    info!("Configuration loaded successfully");
    debug!("Config: {:?}", config);

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.session.cookie_name.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "session.cookie_name cannot be empty".into(),
        ));
    }

    if config
        .session
        .cookie_name
        .contains(|c: char| c.is_whitespace() || matches!(c, ';' | ',' | '='))
    {
        return Err(ConfigError::InvalidConfig(format!(
            "session.cookie_name {:?} is not a valid cookie name",
            config.session.cookie_name
        )));
    }

    let base = &config.identity.base_url;
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ConfigError::InvalidConfig(
            "identity.base_url must be an http(s) URL".into(),
        ));
    }

    if let Some(url) = &config.flags.url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidConfig(
                "flags.url must be an http(s) URL".into(),
            ));
        }
    }

    // Every outbound call sits on the page-load path; a zero timeout would
    // mean "wait forever" to some clients.
    if config.identity.timeout_ms == 0
        || config.flags.timeout_ms == 0
        || config.server.upstream_timeout_ms == 0
    {
        return Err(ConfigError::InvalidConfig(
            "timeouts must be greater than 0".into(),
        ));
    }

    for path in config
        .routes
        .public_paths
        .iter()
        .chain(&config.routes.public_prefixes)
        .chain(&config.routes.bypass_prefixes)
    {
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "route {:?} must start with '/'",
                path
            )));
        }
    }

    if config.access.contains_key(&Role::Unknown) {
        return Err(ConfigError::InvalidConfig(
            "access table contains an unrecognised role".into(),
        ));
    }

    for (role, patterns) in &config.access {
        if let Some(bad) = patterns.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::InvalidConfig(format!(
                "access pattern {:?} for role {} must start with '/'",
                bad, role
            )));
        }
    }

    Ok(())
}
