use std::path::Path;

use crate::config::schema::EngineConfig;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.host_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "host_timeout_secs must be greater than zero".to_string(),
        });
    }

    if config.max_concurrent_hosts == 0 {
        return Err(ConfigError::Validation {
            message: "max_concurrent_hosts must be greater than zero".to_string(),
        });
    }

    if config.run_deadline_secs == Some(0) {
        return Err(ConfigError::Validation {
            message: "run_deadline_secs must be greater than zero".to_string(),
        });
    }

    if config.table_command.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "table_command must not be empty".to_string(),
        });
    }

    if !config.vlan_filter_template.contains("{vlan}") {
        return Err(ConfigError::Validation {
            message: format!(
                "vlan_filter_template '{}' must contain '{{vlan}}'",
                config.vlan_filter_template
            ),
        });
    }

    if config.ssh.binary.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "ssh.binary must not be empty".to_string(),
        });
    }

    Ok(())
}
