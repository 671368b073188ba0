use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Gate endpoint is an http(s) URL
/// - Retry interval and request timeout are not 0
/// - max_wait_secs, when set, is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let gate = &config.gate;

    let endpoint = gate.endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::ValidationError(
            "gate.endpoint cannot be empty".to_string(),
        ));
    }
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "gate.endpoint must start with http:// or https:// (got {})",
            endpoint
        )));
    }

    if gate.retry_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "gate.retry_interval_ms cannot be 0".to_string(),
        ));
    }

    if gate.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "gate.request_timeout_secs cannot be 0".to_string(),
        ));
    }

    if gate.max_wait_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "gate.max_wait_secs cannot be 0 (omit it to wait without a limit)".to_string(),
        ));
    }

    Ok(())
}
