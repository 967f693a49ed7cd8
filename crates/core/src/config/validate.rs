use regex_lite::Regex;

use super::{
    types::{Config, StageMode},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Stage section exists (enforced by serde)
/// - Server port is not 0
/// - Worker pool size is at least 1
/// - Queue name is non-empty
/// - Artifact filename pattern compiles
/// - Poll interval is non-zero (sequential mode would spin otherwise)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.stage.max_workers == 0 {
        return Err(ConfigError::ValidationError(
            "stage.max_workers must be at least 1".to_string(),
        ));
    }

    if config.broker.queue.is_empty() {
        return Err(ConfigError::ValidationError(
            "broker.queue cannot be empty".to_string(),
        ));
    }

    if let Err(e) = Regex::new(&config.stage.artifact_pattern) {
        return Err(ConfigError::ValidationError(format!(
            "stage.artifact_pattern is not a valid regex: {}",
            e
        )));
    }

    if config.stage.mode == StageMode::Sequential {
        if config.analyzer.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "analyzer.base_url cannot be empty in sequential mode".to_string(),
            ));
        }
        if config.analyzer.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "analyzer.poll_interval_secs must be at least 1".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn parallel_config() -> Config {
        load_config_from_str(
            r#"
[stage]
mode = "parallel"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        let config = parallel_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = parallel_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let mut config = parallel_config();
        config.stage.max_workers = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_queue_fails() {
        let mut config = parallel_config();
        config.broker.queue = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_pattern_fails() {
        let mut config = parallel_config();
        config.stage.artifact_pattern = "[unclosed".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_sequential_zero_interval_fails() {
        let config = load_config_from_str(
            r#"
[stage]
mode = "sequential"

[analyzer]
poll_interval_secs = 0
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }
}
