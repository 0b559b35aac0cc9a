//! Workspace configuration loaded from `.handover/config.toml`.
//!
//! A missing file yields defaults. Secrets may be supplied through the
//! environment instead of the file.

use crate::core::error::HandoverError;
use crate::plugins::newsletter::scheduler::WeeklySchedule;
use crate::plugins::phase::PhaseWeights;
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const ENV_API_KEY: &str = "HANDOVER_EMAIL_API_KEY";
pub const ENV_SENDER_EMAIL: &str = "HANDOVER_SENDER_EMAIL";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HandoverConfig {
    pub scoring: ScoringConfig,
    pub newsletter: NewsletterConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Deployment-wide phase weights; not overridable per project.
    pub phase_weights: PhaseWeights,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NewsletterConfig {
    pub sender_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// IANA timezone the weekly trigger is evaluated in.
    pub timezone: String,
    pub weekday: String,
    pub hour: u32,
    pub minute: u32,
    pub request_timeout_secs: u64,
}

impl Default for NewsletterConfig {
    fn default() -> Self {
        Self {
            sender_name: "Handover Management System".to_string(),
            sender_email: None,
            api_url: "https://api.brevo.com/v3/smtp/email".to_string(),
            api_key: None,
            timezone: "Europe/London".to_string(),
            weekday: "Fri".to_string(),
            hour: 9,
            minute: 0,
            request_timeout_secs: 30,
        }
    }
}

impl NewsletterConfig {
    pub fn timezone(&self) -> Result<Tz, HandoverError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| HandoverError::ConfigError(format!("timezone '{}': {}", self.timezone, e)))
    }

    pub fn weekday(&self) -> Result<Weekday, HandoverError> {
        self.weekday
            .parse::<Weekday>()
            .map_err(|_| HandoverError::ConfigError(format!("weekday '{}' is not a day name", self.weekday)))
    }

    pub fn schedule(&self) -> Result<WeeklySchedule, HandoverError> {
        WeeklySchedule::new(self.weekday()?, self.hour, self.minute, self.timezone()?)
    }

    /// Sender address and API key, both required before anything is dispatched.
    pub fn credentials(&self) -> Result<(&str, &str), HandoverError> {
        let sender = self
            .sender_email
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                HandoverError::ConfigError(format!(
                    "newsletter.sender_email is not set (or set {})",
                    ENV_SENDER_EMAIL
                ))
            })?;
        let key = self
            .api_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                HandoverError::ConfigError(format!(
                    "newsletter.api_key is not set (or set {})",
                    ENV_API_KEY
                ))
            })?;
        Ok((sender, key))
    }
}

/// Load `config.toml` from the workspace directory and apply environment overrides.
pub fn load_config(workspace_dir: &Path) -> Result<HandoverConfig, HandoverError> {
    let config = read_config_file(workspace_dir)?;
    Ok(apply_overrides(config, |key| std::env::var(key).ok()))
}

pub fn read_config_file(workspace_dir: &Path) -> Result<HandoverConfig, HandoverError> {
    let config_path = workspace_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(HandoverConfig::default());
    }
    let content = fs::read_to_string(&config_path).map_err(HandoverError::IoError)?;
    toml::from_str(&content)
        .map_err(|e| HandoverError::ConfigError(format!("{}: {}", config_path.display(), e)))
}

pub fn apply_overrides<F>(mut config: HandoverConfig, lookup: F) -> HandoverConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
        config.newsletter.api_key = Some(key);
    }
    if let Some(sender) = lookup(ENV_SENDER_EMAIL).filter(|v| !v.is_empty()) {
        config.newsletter.sender_email = Some(sender);
    }
    config
}

/// Write the default configuration unless a file already exists.
pub fn write_default_config(workspace_dir: &Path) -> Result<bool, HandoverError> {
    let config_path = workspace_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        return Ok(false);
    }
    let body = toml::to_string_pretty(&HandoverConfig::default())
        .map_err(|e| HandoverError::ConfigError(e.to_string()))?;
    fs::create_dir_all(workspace_dir)?;
    fs::write(&config_path, body)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = read_config_file(tmp.path()).unwrap();
        assert_eq!(config.newsletter.hour, 9);
        assert_eq!(config.scoring.phase_weights.weight_for("Phase 1"), 50);
        assert_eq!(config.newsletter.timezone().unwrap(), chrono_tz::Europe::London);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[newsletter]\nweekday = \"Mon\"\nhour = 7\n\n[scoring.phase_weights]\n\"Phase 1\" = 60\n\"Phase 2\" = 40\n",
        )
        .unwrap();
        let config = read_config_file(tmp.path()).unwrap();
        assert_eq!(config.newsletter.weekday().unwrap(), Weekday::Mon);
        assert_eq!(config.newsletter.hour, 7);
        assert_eq!(config.newsletter.minute, 0);
        assert_eq!(config.scoring.phase_weights.weight_for("Phase 1"), 60);
        assert_eq!(config.scoring.phase_weights.weight_for("Phase 3"), 0);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "newsletter = [").unwrap();
        let err = read_config_file(tmp.path()).unwrap_err();
        assert!(matches!(err, HandoverError::ConfigError(_)));
    }

    #[test]
    fn test_env_overrides_credentials() {
        let config = apply_overrides(HandoverConfig::default(), |key| match key {
            ENV_API_KEY => Some("xkeysib-123".to_string()),
            ENV_SENDER_EMAIL => Some("noreply@example.com".to_string()),
            _ => None,
        });
        let (sender, key) = config.newsletter.credentials().unwrap();
        assert_eq!(sender, "noreply@example.com");
        assert_eq!(key, "xkeysib-123");
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = HandoverConfig::default().newsletter.credentials().unwrap_err();
        assert!(format!("{}", err).contains("sender_email"));
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(write_default_config(tmp.path()).unwrap());
        assert!(!write_default_config(tmp.path()).unwrap());
        let config = read_config_file(tmp.path()).unwrap();
        assert_eq!(config.newsletter.weekday, "Fri");
    }
}
