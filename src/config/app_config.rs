use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;
use config::File;
use config::FileFormat;
use serde::{Deserialize, Serialize};

use crate::common::common_constants::DEFAULT_CONFIG_PATH;
use crate::common::common_constants::ENV_PREFIX;
use crate::MigrateArgs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: EndpointConfig,
    #[serde(default)]
    pub target: EndpointConfig,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub tuning: TuningConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    #[serde(default = "default_on_duplicate")]
    pub on_duplicate: String,
    #[serde(default)]
    pub default_owner_id: Option<String>,
    #[serde(default = "default_objects_source")]
    pub objects_source: String,
    #[serde(default = "default_objects_file_path")]
    pub objects_file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_rate_limit_per_second")]
    pub rate_limit_per_second: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub console: Option<bool>,
}

fn default_verify_ssl() -> bool {
    true
}
fn default_on_duplicate() -> String {
    "ask".to_string()
}
fn default_objects_source() -> String {
    "api".to_string()
}
fn default_objects_file_path() -> String {
    "source_objects.json".to_string()
}
fn default_max_concurrent_requests() -> usize {
    10
}
fn default_rate_limit_per_second() -> u32 {
    50
}
fn default_request_timeout() -> u64 {
    30
}
fn default_retry_attempts() -> u32 {
    3
}

impl Default for GeneralConfig {
    fn default() -> GeneralConfig {
        GeneralConfig {
            verify_ssl: default_verify_ssl(),
            on_duplicate: default_on_duplicate(),
            default_owner_id: None,
            objects_source: default_objects_source(),
            objects_file_path: default_objects_file_path(),
        }
    }
}

impl Default for TuningConfig {
    fn default() -> TuningConfig {
        TuningConfig {
            max_concurrent_requests: default_max_concurrent_requests(),
            rate_limit_per_second: default_rate_limit_per_second(),
            request_timeout: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the YAML file (optional unless a path was
    /// given explicitly) and the `CONFMIG__*` environment, file first.
    pub fn load_config(config_file: Option<&str>) -> Result<AppConfig, anyhow::Error> {
        dotenv::dotenv().ok();

        let mut builder = ConfigBuilder::<DefaultState>::default();
        let (path, required) = match config_file {
            Some(path) => (path, true),
            None => (DEFAULT_CONFIG_PATH, false),
        };
        builder = builder.add_source(File::new(path, FileFormat::Yaml).required(required));
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }

    /// Command line flags override file and environment values.
    pub fn apply_overrides(&mut self, args: &MigrateArgs) {
        if let Some(url) = &args.source_url {
            self.source.url = url.clone();
        }
        if let Some(token) = &args.source_token {
            self.source.token = token.clone();
        }
        if let Some(url) = &args.target_url {
            self.target.url = url.clone();
        }
        if let Some(token) = &args.target_token {
            self.target.token = token.clone();
        }
        if args.no_verify_ssl {
            self.general.verify_ssl = false;
        }
        if let Some(source) = &args.objects_source {
            self.general.objects_source = source.clone();
        }
        if let Some(path) = &args.objects_file_path {
            self.general.objects_file_path = path.clone();
        }
        if let Some(owner) = &args.default_owner_id {
            self.general.default_owner_id = Some(owner.clone());
        }
        if let Some(on_duplicate) = &args.on_duplicate {
            self.general.on_duplicate = on_duplicate.clone();
        }
        if let Some(max_concurrent) = args.max_concurrent {
            self.tuning.max_concurrent_requests = max_concurrent;
        }
        if let Some(rate_limit) = args.rate_limit {
            self.tuning.rate_limit_per_second = rate_limit;
        }
        if let Some(timeout) = args.request_timeout {
            self.tuning.request_timeout = timeout;
        }
        if let Some(retries) = args.retry_attempts {
            self.tuning.retry_attempts = retries;
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.source.url.is_empty() {
            return Err(anyhow!("source backend URL is required"));
        }
        if self.source.token.is_empty() {
            return Err(anyhow!("source API token is required"));
        }
        if self.target.url.is_empty() {
            return Err(anyhow!("target backend URL is required"));
        }
        if self.target.token.is_empty() {
            return Err(anyhow!("target API token is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_config() -> AppConfig {
        AppConfig {
            source: EndpointConfig {
                url: "https://source.example.com".to_string(),
                token: "s".to_string(),
            },
            target: EndpointConfig {
                url: "https://target.example.com".to_string(),
                token: "t".to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_the_documented_tuning() {
        let tuning = TuningConfig::default();
        assert_eq!(tuning.max_concurrent_requests, 10);
        assert_eq!(tuning.rate_limit_per_second, 50);
        assert_eq!(tuning.request_timeout, 30);
        assert_eq!(tuning.retry_attempts, 3);
        let general = GeneralConfig::default();
        assert!(general.verify_ssl);
        assert_eq!(general.on_duplicate, "ask");
    }

    #[test]
    fn validate_rejects_missing_pieces() {
        let mut app_config = complete_config();
        assert!(app_config.validate().is_ok());
        app_config.target.token.clear();
        assert!(app_config.validate().is_err());
        app_config.source.url.clear();
        assert!(app_config.validate().is_err());
    }

    #[test]
    fn cli_flags_override_loaded_values() {
        let mut app_config = complete_config();
        let args = MigrateArgs {
            config_file: None,
            source_url: Some("https://other.example.com".to_string()),
            source_token: None,
            target_url: None,
            target_token: None,
            no_verify_ssl: true,
            objects_source: Some("file".to_string()),
            objects_file_path: None,
            default_owner_id: None,
            on_duplicate: Some("skip".to_string()),
            max_concurrent: Some(4),
            rate_limit: None,
            request_timeout: None,
            retry_attempts: None,
        };
        app_config.apply_overrides(&args);
        assert_eq!(app_config.source.url, "https://other.example.com");
        assert!(!app_config.general.verify_ssl);
        assert_eq!(app_config.general.objects_source, "file");
        assert_eq!(app_config.general.on_duplicate, "skip");
        assert_eq!(app_config.tuning.max_concurrent_requests, 4);
    }
}
