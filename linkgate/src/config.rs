use redirector::config::Config as RedirectorConfig;
use serde::Deserialize;
use std::fs::File;

/// Overrides `redirector.redirect.allow_incoming_utm_override`.
pub const ENV_ALLOW_UTM_OVERRIDE: &str = "LINKGATE_ALLOW_UTM_OVERRIDE";

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    /// Default filter directive, used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

#[derive(Debug, Deserialize)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub redirector: RedirectorConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Applies environment overrides, reading variables through `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_ALLOW_UTM_OVERRIDE) {
            self.redirector.redirect.allow_incoming_utm_override =
                parse_flag(&value).ok_or_else(|| ConfigError::InvalidEnv {
                    name: ENV_ALLOW_UTM_OVERRIDE,
                    value,
                })?;
        }
        Ok(self)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::config::BackendConfig;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    const YAML: &str = r#"
            logging:
                sentry_dsn: "https://key@sentry.example/1"
                level: debug
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            redirector:
                listener:
                    host: 0.0.0.0
                    port: 8080
                admin_listener:
                    host: 127.0.0.1
                    port: 8081
                registry:
                    type: http
                    url: https://registry.internal/v1
                    database_id: links
                    token_env: REGISTRY_TOKEN
                redirect:
                    short_link_patterns: ["/go/{slug}"]
            "#;

    #[test]
    fn full_config() {
        let tmp = write_tmp_file(YAML);
        let config = Config::from_file(tmp.path()).expect("load config");

        let logging = config.common.logging.expect("logging config");
        assert_eq!(logging.level, "debug");
        assert!(logging.sentry_dsn.is_some());
        assert_eq!(config.common.metrics.expect("metrics config").statsd_port, 8125);

        let redirector = config.redirector;
        assert!(redirector.validate().is_ok());
        assert!(matches!(redirector.registry.backend, BackendConfig::Http(_)));
        assert!(!redirector.redirect.allow_incoming_utm_override);
        assert_eq!(redirector.redirect.short_link_patterns, ["/go/{slug}"]);
    }

    #[test]
    fn minimal_config() {
        let tmp = write_tmp_file(
            r#"
            redirector:
                listener: {host: 0.0.0.0, port: 8080}
                admin_listener: {host: 127.0.0.1, port: 8081}
                registry: {type: static, path: links.yaml}
            "#,
        );
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(config.common.logging.is_none());
        assert!(config.common.metrics.is_none());
        assert!(config.redirector.upstream.is_none());
    }

    #[test]
    fn env_override() {
        let tmp = write_tmp_file(YAML);

        let config = Config::from_file(tmp.path())
            .unwrap()
            .with_env_overrides(|name| (name == ENV_ALLOW_UTM_OVERRIDE).then(|| "TRUE".into()))
            .unwrap();
        assert!(config.redirector.redirect.allow_incoming_utm_override);

        let config = Config::from_file(tmp.path())
            .unwrap()
            .with_env_overrides(|_| None)
            .unwrap();
        assert!(!config.redirector.redirect.allow_incoming_utm_override);

        let result = Config::from_file(tmp.path())
            .unwrap()
            .with_env_overrides(|_| Some("maybe".into()));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn load_errors() {
        assert!(matches!(
            Config::from_file(std::path::Path::new("/nonexistent/linkgate.yaml")),
            Err(ConfigError::LoadError(_))
        ));

        let tmp = write_tmp_file("redirector: [1, 2]");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
