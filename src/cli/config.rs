use anyhow::{bail, Context, Result};
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Required configuration file inside the config directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Optional file merged over [`CONFIG_FILE`]
pub const LOCAL_CONFIG_FILE: &str = "config.local.yaml";

/// Prefix of environment variables overriding configuration keys
pub const ENV_PREFIX: &str = "APP";

/// HTTP methods a crawl target may use
const ALLOWED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub crawls: Vec<CrawlConfig>,
    pub alerts: AlertsConfig,
}

/// Logging settings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Include source file and line numbers in log lines
    pub caller: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// One poll/check/notify definition
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CrawlConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    /// Time between the starts of two cycles, e.g. `30s` or `5m`
    #[serde(with = "humantime_serde", default)]
    pub interval: Duration,
    pub target: TargetConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TargetConfig {
    pub http: HttpTargetConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct HttpTargetConfig {
    pub method: String,
    pub url: String,
    pub header: BTreeMap<String, String>,
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub check: String,
    /// Variable name to query producing its value
    pub variables: BTreeMap<String, String>,
}

/// Messaging backend selection and credentials
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AlertsConfig {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub telegram: TelegramConfig,
    pub discord: DiscordConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    #[default]
    Telegram,
    Discord,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct DiscordConfig {
    pub webhook_urls: Vec<String>,
}

impl Config {
    /// Load `config.yaml` from `dir`, merge `config.local.yaml` over it when
    /// present, then apply `APP_*` environment overrides
    pub fn load(dir: &Path) -> Result<Self> {
        Self::load_with_env(dir, std::env::vars())
    }

    /// Same as [`Config::load`] with an explicit set of environment variables
    pub fn load_with_env<I>(dir: &Path, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let base_path = dir.join(CONFIG_FILE);
        debug!("Loading configuration from: {}", base_path.display());

        let env: config::Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (index_segments(&key), value))
            .collect();

        let settings = config::Config::builder()
            .add_source(File::from(base_path))
            .add_source(File::from(dir.join(LOCAL_CONFIG_FILE)).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("_").source(Some(env)))
            .build()
            .with_context(|| format!("loading configuration from {}", dir.display()))?;

        settings.try_deserialize().context("unmarshaling into config struct")
    }

    pub fn validate(&self) -> Result<()> {
        self.alerts.validate().context("validating alerts config")?;

        for crawl in &self.crawls {
            crawl.validate().context("validating crawl config")?;
        }

        Ok(())
    }

    pub fn enabled_crawls(&self) -> impl Iterator<Item = &CrawlConfig> {
        self.crawls.iter().filter(|crawl| crawl.enabled)
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("name should not be empty");
        }
        if self.interval.is_zero() {
            bail!("interval of {} should be positive", self.name);
        }
        if self.message.is_empty() {
            bail!("message of {} should not be empty", self.name);
        }

        self.target
            .http
            .validate()
            .with_context(|| format!("validating http target of {}", self.name))?;

        Ok(())
    }
}

impl HttpTargetConfig {
    pub fn validate(&self) -> Result<()> {
        if !ALLOWED_METHODS.contains(&self.method.as_str()) {
            bail!("unexpected method '{}'", self.method);
        }

        Url::parse(&self.url).with_context(|| format!("parsing url '{}'", self.url))?;

        Ok(())
    }
}

impl AlertsConfig {
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            AlertKind::Telegram => self.telegram.validate().context("validating telegram config"),
            AlertKind::Discord => self.discord.validate().context("validating discord config"),
        }
    }
}

impl TelegramConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.is_empty() {
            bail!("bot token should not be empty");
        }
        if self.chat_ids.is_empty() {
            bail!("chat ids should not be empty");
        }
        Ok(())
    }
}

impl DiscordConfig {
    pub fn validate(&self) -> Result<()> {
        if self.webhook_urls.is_empty() {
            bail!("webhook urls should not be empty");
        }
        for raw in &self.webhook_urls {
            Url::parse(raw).with_context(|| format!("parsing webhook url '{}'", raw))?;
        }
        Ok(())
    }
}

/// Rewrite numeric `_N` segments into the `[N]` subscripts the `config`
/// path syntax uses for sequences, so `APP_CRAWLS_0_ENABLED` addresses
/// `crawls[0].enabled` instead of a mapping key named `0`
fn index_segments(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 2);
    for (i, segment) in key.split('_').enumerate() {
        if i > 0 && !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(segment);
            out.push(']');
        } else {
            if i > 0 {
                out.push('_');
            }
            out.push_str(segment);
        }
    }
    out
}
