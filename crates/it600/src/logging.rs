use tracing_subscriber::filter::Directive;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::ConfigError;

/// Build the tracing filter for a logging config: the global level plus one
/// directive per override.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    let mut filter = EnvFilter::default().add_directive(LevelFilter::from(config.level).into());

    let mut targets: Vec<_> = config.overrides.iter().collect();
    targets.sort();
    for (target, level) in targets {
        let directive = format!("{}={}", target, LevelFilter::from(*level));
        let parsed: Directive = directive.parse().map_err(|e| ConfigError::Logging {
            directive: directive.clone(),
            reason: format!("{}", e),
        })?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

/// Install the global tracing subscriber.
///
/// Fails if the config is invalid or a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = env_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| ConfigError::Logging {
            directive: "<global>".to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_filter_includes_overrides() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            overrides: HashMap::from([("it600::mirror".to_string(), LogLevel::Debug)]),
        };
        let filter = env_filter(&config).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("it600::mirror=debug"), "{}", rendered);
        assert!(rendered.contains("warn"), "{}", rendered);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
