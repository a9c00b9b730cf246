mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Upper bound on `queue.default_estimate_secs` (one week).
const MAX_DEFAULT_ESTIMATE_SECS: u64 = 7 * 24 * 60 * 60;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./convertd.toml",
        "~/.config/convertd/config.toml",
        "/etc/convertd/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.queue.workers == 0 {
        anyhow::bail!("queue.workers must be at least 1");
    }
    if config.queue.max_queued == 0 {
        anyhow::bail!("queue.max_queued must be at least 1");
    }
    if config.queue.history_capacity == 0 {
        anyhow::bail!("queue.history_capacity must be at least 1");
    }
    if config.queue.default_estimate_secs > MAX_DEFAULT_ESTIMATE_SECS {
        anyhow::bail!(
            "queue.default_estimate_secs must be at most {}",
            MAX_DEFAULT_ESTIMATE_SECS
        );
    }
    if config.queue.default_timeout_secs == 0 {
        anyhow::bail!("queue.default_timeout_secs must be at least 1");
    }

    let mut seen = HashSet::new();
    for tool in &config.tools {
        if tool.name.trim().is_empty() {
            anyhow::bail!("Tool with program {:?} has an empty name", tool.program);
        }
        if !seen.insert(tool.name.as_str()) {
            anyhow::bail!("Tool '{}' is defined more than once", tool.name);
        }
        if tool.output_extension.trim().is_empty() {
            anyhow::bail!("Tool '{}' has no output_extension", tool.name);
        }
        if tool.timeout_secs == Some(0) {
            anyhow::bail!("Tool '{}' has a zero timeout", tool.name);
        }
    }

    if config.tools.is_empty() {
        tracing::warn!("No conversion tools configured; every submission will be rejected");
    }

    Ok(())
}
