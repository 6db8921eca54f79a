//! Process configuration.
//!
//! Layering: optional `config/studiodesk.toml`, then environment variables
//! prefixed `STUDIODESK` with `__` as the section separator
//! (`STUDIODESK__DATABASE__URL`, `STUDIODESK__NOTIFICATIONS__MODE`, ...).

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use studiodesk_core::{DomainError, Percent};

pub const DEFAULT_CONFIG_FILE: &str = "config/studiodesk";
pub const ENV_PREFIX: &str = "STUDIODESK";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

impl From<DomainError> for ConfigError {
    fn from(err: DomainError) -> Self {
        Self::Invalid(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StudioConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `format` is `json` or `pretty`; `filter` applies when `RUST_LOG` is unset.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Absent: run against the in-memory store.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMode {
    #[default]
    Log,
    Http,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificationConfig {
    #[serde(default)]
    pub mode: NotificationMode,
    #[serde(default)]
    pub email_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub followup_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(default = "default_tax_rate_percent")]
    pub tax_rate_percent: f64,
    #[serde(default = "default_deposit_percent")]
    pub default_deposit_percent: f64,
    #[serde(default = "default_followup_delay_secs")]
    pub followup_delay_secs: u64,
    #[serde(default = "default_followup_delay_cap_secs")]
    pub followup_delay_cap_secs: u64,
    #[serde(default = "default_contract_validity_days")]
    pub contract_validity_days: u32,
    #[serde(default = "default_public_origin")]
    pub public_origin: String,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            tax_rate_percent: default_tax_rate_percent(),
            default_deposit_percent: default_deposit_percent(),
            followup_delay_secs: default_followup_delay_secs(),
            followup_delay_cap_secs: default_followup_delay_cap_secs(),
            contract_validity_days: default_contract_validity_days(),
            public_origin: default_public_origin(),
        }
    }
}

fn default_tax_rate_percent() -> f64 {
    10.0
}

fn default_deposit_percent() -> f64 {
    25.0
}

fn default_followup_delay_secs() -> u64 {
    30
}

fn default_followup_delay_cap_secs() -> u64 {
    45
}

fn default_contract_validity_days() -> u32 {
    30
}

fn default_public_origin() -> String {
    "http://localhost:8080".to_string()
}

/// Validated provisioning parameters, resolved once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningSettings {
    pub tax_rate: Percent,
    pub default_deposit_percent: Percent,
    pub followup_delay: Duration,
    pub followup_delay_cap: Duration,
    pub contract_validity_days: u32,
    pub public_origin: String,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            tax_rate: Percent::whole(10),
            default_deposit_percent: Percent::whole(25),
            followup_delay: Duration::from_secs(default_followup_delay_secs()),
            followup_delay_cap: Duration::from_secs(default_followup_delay_cap_secs()),
            contract_validity_days: default_contract_validity_days(),
            public_origin: default_public_origin(),
        }
    }
}

impl ProvisioningSettings {
    /// Public URL a client opens to sign a contract.
    pub fn signing_url(&self, token: &str) -> String {
        format!("{}/sign/{}", self.public_origin.trim_end_matches('/'), token)
    }

    /// Requested follow-up delay, never beyond the cap.
    pub fn followup_delay(&self) -> Duration {
        self.followup_delay.min(self.followup_delay_cap)
    }
}

impl TryFrom<&ProvisioningConfig> for ProvisioningSettings {
    type Error = ConfigError;

    fn try_from(cfg: &ProvisioningConfig) -> Result<Self, Self::Error> {
        let tax_rate = Percent::from_decimal(cfg.tax_rate_percent)?;
        let default_deposit_percent = Percent::from_decimal(cfg.default_deposit_percent)?
            .ensure_at_most_hundred("default deposit percent")?;
        if cfg.contract_validity_days == 0 {
            return Err(ConfigError::Invalid(
                "contract_validity_days must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            tax_rate,
            default_deposit_percent,
            followup_delay: Duration::from_secs(cfg.followup_delay_secs),
            followup_delay_cap: Duration::from_secs(cfg.followup_delay_cap_secs),
            contract_validity_days: cfg.contract_validity_days,
            public_origin: cfg.public_origin.clone(),
        })
    }
}

impl StudioConfig {
    /// Load from the default file (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Self::from_config(settings)
    }

    pub fn from_config(settings: Config) -> Result<Self, ConfigError> {
        let cfg: StudioConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn provisioning_settings(&self) -> Result<ProvisioningSettings, ConfigError> {
        ProvisioningSettings::try_from(&self.provisioning)
    }

    /// Structural checks only. Missing notification credentials are not
    /// fatal here; provisioning refuses to run until they are present.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Missing("server.bind"));
        }
        if self.notifications.mode == NotificationMode::Http
            && self.notifications.email_url.is_none()
        {
            return Err(ConfigError::Missing("notifications.email_url"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        self.provisioning_settings().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use proptest::prelude::*;

    fn from_toml(toml: &str) -> Result<StudioConfig, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        StudioConfig::from_config(settings)
    }

    #[test]
    fn defaults_apply_to_an_empty_source() {
        let cfg = from_toml("").unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.database.url, None);
        assert_eq!(cfg.notifications.mode, NotificationMode::Log);
        assert_eq!(cfg.logging.format, "json");

        let settings = cfg.provisioning_settings().unwrap();
        assert_eq!(settings, ProvisioningSettings::default());
        assert_eq!(settings.followup_delay(), Duration::from_secs(30));
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = from_toml(
            r#"
            [notifications]
            mode = "http"
            email_url = "https://mail.example.com/send"

            [provisioning]
            tax_rate_percent = 15
            followup_delay_secs = 120
            public_origin = "https://book.example.com/"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.notifications.mode, NotificationMode::Http);
        assert_eq!(cfg.notifications.api_key, None);

        let settings = cfg.provisioning_settings().unwrap();
        assert_eq!(settings.tax_rate, Percent::whole(15));
        assert_eq!(settings.followup_delay(), Duration::from_secs(45));
        assert_eq!(settings.signing_url("abc"), "https://book.example.com/sign/abc");
    }

    #[test]
    fn http_mode_needs_an_endpoint() {
        let err = from_toml("[notifications]\nmode = \"http\"").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("notifications.email_url")));
    }

    #[test]
    fn deposit_over_hundred_is_rejected() {
        let err = from_toml("[provisioning]\ndefault_deposit_percent = 120").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    proptest! {
        #[test]
        fn followup_delay_never_exceeds_the_cap(requested in 0u64..10_000, cap in 0u64..10_000) {
            let settings = ProvisioningSettings {
                followup_delay: Duration::from_secs(requested),
                followup_delay_cap: Duration::from_secs(cap),
                ..ProvisioningSettings::default()
            };
            prop_assert_eq!(settings.followup_delay(), Duration::from_secs(requested.min(cap)));
        }

        #[test]
        fn signing_url_has_a_single_separator(slashes in 0usize..4, token in "[a-f0-9]{8,32}") {
            let settings = ProvisioningSettings {
                public_origin: format!("https://studio.example.com{}", "/".repeat(slashes)),
                ..ProvisioningSettings::default()
            };
            prop_assert_eq!(
                settings.signing_url(&token),
                format!("https://studio.example.com/sign/{token}")
            );
        }
    }
}
