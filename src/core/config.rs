use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::core::db::PoolOptions;
use crate::core::error::{ConfigError, JobConfigError};
use crate::core::job::Job;
use crate::core::notify::{DEFAULT_MAX_MESSAGE_LENGTH, LINE_NOTIFY_ENDPOINT, NotifierOptions};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// SQLite path or URI the monitoring queries run against.
    #[serde(default, alias = "DSN")]
    pub dsn: String,

    /// Token used by every job that does not carry its own.
    #[serde(default, alias = "TOKEN_LINE")]
    pub default_token: String,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Names from the built-in job catalogue to enable.
    #[serde(default)]
    pub builtin_jobs: Vec<String>,

    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// A job declared in the config file. Hooks can only be attached to jobs
/// defined in code.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub query: String,
    pub cron: String,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_endpoint() -> String {
    LINE_NOTIFY_ENDPOINT.to_string()
}
fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LENGTH
}
fn default_notify_timeout() -> u64 {
    10
}
fn default_max_connections() -> usize {
    5
}
fn default_max_lifetime() -> u64 {
    180
}
fn default_query_timeout() -> u64 {
    30
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    10080
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_message_length: default_max_message_length(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_lifetime_secs: default_max_lifetime(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl JobConfig {
    pub fn build(&self) -> Result<Job, JobConfigError> {
        let mut builder = Job::builder()
            .name(&self.name)
            .query(&self.query)
            .cron(&self.cron)
            .labels(self.labels.iter().cloned())
            .columns(self.columns.iter().cloned());
        if let Some(description) = &self.description {
            builder = builder.description(description);
        }
        if let Some(header) = &self.header {
            builder = builder.header(header);
        }
        if let Some(token) = &self.token {
            builder = builder.token(token);
        }
        builder.build()
    }
}

impl AppConfig {
    /// Reads and validates the YAML config, then applies `DBNOTIFY_*` overrides.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: shown.clone(),
                source,
            })?;

        let mut config = Self::from_yaml(&content, &shown)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        info!(
            "Loaded config from {}: dsn={}, jobs={}, builtin={:?}, server={}:{}",
            shown,
            config.dsn,
            config.jobs.len(),
            config.builtin_jobs,
            config.server.host,
            config.server.port
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str, path: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dsn) = lookup("DBNOTIFY_DSN").filter(|v| !v.is_empty()) {
            self.dsn = dsn;
        }
        if let Some(token) = lookup("DBNOTIFY_TOKEN").filter(|v| !v.is_empty()) {
            self.default_token = token;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dsn.trim().is_empty() {
            return Err(ConfigError::Missing("dsn"));
        }
        Ok(())
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.pool.max_connections,
            max_lifetime: Duration::from_secs(self.pool.max_lifetime_secs),
            query_timeout: Duration::from_secs(self.pool.query_timeout_secs),
        }
    }

    pub fn notifier_options(&self) -> NotifierOptions {
        NotifierOptions {
            endpoint: self.notify.endpoint.clone(),
            max_message_length: self.notify.max_message_length,
            timeout: Duration::from_secs(self.notify.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = AppConfig::from_yaml("dsn: ./monitor.db\n", "test").unwrap();
        assert_eq!(config.dsn, "./monitor.db");
        assert_eq!(config.notify.endpoint, LINE_NOTIFY_ENDPOINT);
        assert_eq!(config.notify.max_message_length, 800);
        assert_eq!(config.pool.max_connections, 5);
        assert_eq!(config.server.port, 10080);
        assert!(config.jobs.is_empty());
    }

    #[test]
    fn accepts_legacy_upper_case_keys() {
        let config = AppConfig::from_yaml("DSN: legacy.db\nTOKEN_LINE: abc\n", "test").unwrap();
        assert_eq!(config.dsn, "legacy.db");
        assert_eq!(config.default_token, "abc");
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config = AppConfig::from_yaml("dsn: file.db\ndefault_token: file\n", "t").unwrap();
        config.apply_overrides(|key| match key {
            "DBNOTIFY_DSN" => Some("env.db".to_string()),
            "DBNOTIFY_TOKEN" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.dsn, "env.db");
        assert_eq!(config.default_token, "file");
    }

    #[test]
    fn declared_jobs_go_through_the_builder() {
        let yaml = r#"
dsn: monitor.db
jobs:
  - name: stuck-sends
    description: Sends not started within 10 minutes
    query: SELECT id FROM sends WHERE started IS NULL
    cron: "0 */10 * * * *"
    header: Stuck sends
    labels: ["id: "]
    columns: ["id"]
  - name: broken
    query: SELECT 1
    cron: "* * * * * *"
    labels: ["a", "b"]
    columns: ["a"]
"#;
        let config = AppConfig::from_yaml(yaml, "t").unwrap();
        let job = config.jobs[0].build().unwrap();
        assert_eq!(job.name(), "stuck-sends");
        assert_eq!(job.header(), "Stuck sends\n");
        assert_eq!(job.description(), "Sends not started within 10 minutes");

        assert!(matches!(
            config.jobs[1].build(),
            Err(JobConfigError::LabelColumnMismatch { .. })
        ));
    }

    #[test]
    fn missing_dsn_fails_validation() {
        let config = AppConfig::from_yaml("default_token: x\n", "t").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("dsn"))));
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let path = std::env::temp_dir().join(format!("dbnotify-cfg-{}.yaml", uuid::Uuid::new_v4()));
        let err = AppConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[tokio::test]
    async fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "dsn: ./monitor.db\nserver:\n  port: 18080\nbuiltin_jobs: [example]\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.server.port, 18080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.builtin_jobs, vec!["example"]);
    }
}
