//! Repository connection settings.
//!
//! Loaded from `CASEGATE_*` environment variables or a JSON file; both paths
//! end in [`RestConfig::validate`].

use crate::credentials::Credentials;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MEDIA_TYPE: &str = "application/vnd.emc.documentum+json";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// REST root, e.g. `https://host:8443/dctm-rest`.
    pub url: String,
    pub repository: String,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Privileged account used for elevated lookups (ticket-based).
    #[serde(default)]
    pub service_username: Option<String>,
    #[serde(default, skip_serializing)]
    pub service_password: Option<String>,

    #[serde(default = "default_media_type")]
    pub media_type: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `RETURN_TOP` bound for ad-hoc queries without one.
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Window for case listings without a search term.
    #[serde(default = "default_case_load_months")]
    pub case_default_load_months: u32,
    /// Process template names offered when starting workflows.
    #[serde(default)]
    pub workflow_processes: Vec<String>,
}

fn default_media_type() -> String {
    DEFAULT_MEDIA_TYPE.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_limit() -> u32 {
    casegate_dql::DEFAULT_RETURN_TOP
}

fn default_page_size() -> u32 {
    100
}

fn default_case_load_months() -> u32 {
    3
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl RestConfig {
    pub fn new(url: &str, repository: &str, username: &str, password: &str) -> Self {
        Self {
            url: url.to_string(),
            repository: repository.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            service_username: None,
            service_password: None,
            media_type: default_media_type(),
            timeout_secs: default_timeout_secs(),
            default_limit: default_limit(),
            page_size: default_page_size(),
            case_default_load_months: default_case_load_months(),
            workflow_processes: Vec::new(),
        }
    }

    pub fn with_service_account(mut self, username: &str, password: &str) -> Self {
        self.service_username = Some(username.to_string());
        self.service_password = Some(password.to_string());
        self
    }

    /// Load from `CASEGATE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup (the environment, in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mut config = Self::new(
            &require("CASEGATE_URL")?,
            &require("CASEGATE_REPOSITORY")?,
            &require("CASEGATE_USERNAME")?,
            &lookup("CASEGATE_PASSWORD").unwrap_or_default(),
        );

        config.service_username = get("CASEGATE_SERVICE_USERNAME");
        config.service_password = lookup("CASEGATE_SERVICE_PASSWORD");
        if let Some(media_type) = get("CASEGATE_MEDIA_TYPE") {
            config.media_type = media_type;
        }
        if let Some(v) = get("CASEGATE_TIMEOUT_SECS") {
            config.timeout_secs = parse_number("CASEGATE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("CASEGATE_DEFAULT_LIMIT") {
            config.default_limit = parse_number("CASEGATE_DEFAULT_LIMIT", &v)?;
        }
        if let Some(v) = get("CASEGATE_PAGE_SIZE") {
            config.page_size = parse_number("CASEGATE_PAGE_SIZE", &v)?;
        }
        if let Some(v) = get("CASEGATE_CASE_LOAD_MONTHS") {
            config.case_default_load_months = parse_number("CASEGATE_CASE_LOAD_MONTHS", &v)?;
        }
        if let Some(v) = get("CASEGATE_WORKFLOW_PROCESSES") {
            config.workflow_processes = split_list(&v);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Missing("url"));
        }
        if self.repository.trim().is_empty() {
            return Err(ConfigError::Missing("repository"));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Missing("username"));
        }
        if self.default_limit == 0 {
            return Err(ConfigError::Invalid("default_limit must be positive".to_string()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".to_string()));
        }
        url::Url::parse(&self.repository_url())
            .map_err(|e| ConfigError::Invalid(format!("url `{}`: {e}", self.url)))?;
        Ok(())
    }

    /// `<url>/repositories/<repository>`: root of every request path.
    pub fn repository_url(&self) -> String {
        format!(
            "{}/repositories/{}",
            self.url.trim().trim_end_matches('/'),
            self.repository.trim()
        )
    }

    pub fn user_credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }

    /// The privileged account, when a non-blank username is configured.
    pub fn service_credentials(&self) -> Option<Credentials> {
        let username = self.service_username.as_deref()?.trim();
        if username.is_empty() {
            return None;
        }
        Some(Credentials::new(
            username,
            self.service_password.as_deref().unwrap_or_default(),
        ))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} must be a number, got `{value}`")))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = RestConfig::from_lookup(lookup(&[
            ("CASEGATE_URL", "https://repo.example.org/dctm-rest/"),
            ("CASEGATE_REPOSITORY", "cms"),
            ("CASEGATE_USERNAME", "clerk"),
            ("CASEGATE_PASSWORD", "secret"),
        ]))
        .unwrap();

        assert_eq!(
            config.repository_url(),
            "https://repo.example.org/dctm-rest/repositories/cms"
        );
        assert_eq!(config.default_limit, 10_000);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.case_default_load_months, 3);
        assert_eq!(config.media_type, DEFAULT_MEDIA_TYPE);
        assert!(config.service_credentials().is_none());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = RestConfig::from_lookup(lookup(&[
            ("CASEGATE_URL", "http://localhost:8080/rest"),
            ("CASEGATE_REPOSITORY", "cms"),
            ("CASEGATE_USERNAME", "clerk"),
            ("CASEGATE_SERVICE_USERNAME", "svc_admin"),
            ("CASEGATE_SERVICE_PASSWORD", "pw"),
            ("CASEGATE_PAGE_SIZE", "50"),
            ("CASEGATE_WORKFLOW_PROCESSES", "Case Approval, ,Transfer"),
        ]))
        .unwrap();

        assert_eq!(config.page_size, 50);
        assert_eq!(config.workflow_processes, vec!["Case Approval", "Transfer"]);
        let service = config.service_credentials().unwrap();
        assert_eq!(service.username, "svc_admin");
        assert_eq!(service.password, "pw");
    }

    #[test]
    fn test_missing_and_invalid_values() {
        let err = RestConfig::from_lookup(lookup(&[("CASEGATE_URL", "http://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CASEGATE_REPOSITORY")));

        let err = RestConfig::from_lookup(lookup(&[
            ("CASEGATE_URL", "http://x"),
            ("CASEGATE_REPOSITORY", "cms"),
            ("CASEGATE_USERNAME", "clerk"),
            ("CASEGATE_DEFAULT_LIMIT", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RestConfig::from_lookup(lookup(&[
            ("CASEGATE_URL", "http://x"),
            ("CASEGATE_REPOSITORY", "cms"),
            ("CASEGATE_USERNAME", "clerk"),
            ("CASEGATE_PAGE_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_blank_service_username_is_unconfigured() {
        let mut config = RestConfig::new("http://x", "cms", "clerk", "pw");
        config.service_username = Some("   ".to_string());
        assert!(config.service_credentials().is_none());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casegate.json");
        std::fs::write(
            &path,
            r#"{
                "url": "https://repo.example.org/rest",
                "repository": "cms",
                "username": "clerk",
                "password": "pw",
                "service_username": "svc",
                "service_password": "svc-pw",
                "workflow_processes": ["Case Approval"]
            }"#,
        )
        .unwrap();

        let config = RestConfig::from_json_file(&path).unwrap();
        assert_eq!(config.repository, "cms");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.workflow_processes, vec!["Case Approval"]);
        assert!(config.service_credentials().is_some());

        let err = RestConfig::from_json_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
