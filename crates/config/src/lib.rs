//! Configuration loading, validation, and management for StudyClaw.
//!
//! Loads configuration from `~/.studyclaw/config.toml` with environment
//! variable overrides (the deployment's variable names: `GEMINI_API_KEY`,
//! `GITHUB_TOKEN`, `TWILIO_*`, `LEARNER_PHONE_NUMBER`,
//! `LEARNING_CALENDAR_ID`). Validates all settings at startup; a missing
//! required credential is a startup-time error, never a mid-run one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.studyclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning-model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Calendar collaborator settings
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Resource-search collaborator settings
    #[serde(default)]
    pub github: GithubConfig,

    /// SMS notification collaborator settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Orchestration-loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Retry/backoff settings (shared by model and tool calls)
    #[serde(default)]
    pub retry: RetryConfig,

    /// Resource-scoring weights
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Recommendation gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("calendar", &self.calendar)
            .field("github", &self.github)
            .field("notify", &self.notify)
            .field("agent", &self.agent)
            .field("retry", &self.retry)
            .field("scoring", &self.scoring)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Gemini API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Override the API base URL (testing/proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_url: None,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Which calendar to read learning events from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,

    /// OAuth bearer token for the Calendar API (supplied externally;
    /// credential *flows* are out of scope here)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Override the API base URL (testing/proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for CalendarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarConfig")
            .field("calendar_id", &self.calendar_id)
            .field("access_token", &redact(&self.access_token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Optional token — search works unauthenticated at a lower rate limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Override the API base URL (testing/proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &redact(&self.token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Twilio account SID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<String>,

    /// Twilio auth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Sending phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_number: Option<String>,

    /// The learner's phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_number: Option<String>,

    /// Override the API base URL (testing/proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("account_sid", &redact(&self.account_sid))
            .field("auth_token", &redact(&self.auth_token))
            .field("from_number", &self.from_number)
            .field("to_number", &self.to_number)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard ceiling on model round-trips per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Wall-clock bound on one run, in seconds
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    /// How many ranked resources each search returns
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// How many resources the composed message cites per event
    #[serde(default = "default_resources_per_event")]
    pub resources_per_event: usize,

    /// Character budget for the composed SMS
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
}

fn default_max_steps() -> u32 {
    15
}
fn default_run_timeout_secs() -> u64 {
    300
}
fn default_top_k() -> usize {
    5
}
fn default_resources_per_event() -> usize {
    2
}
fn default_message_limit() -> usize {
    480
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            run_timeout_secs: default_run_timeout_secs(),
            top_k: default_top_k(),
            resources_per_event: default_resources_per_event(),
            message_limit: default_message_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for one backoff sleep, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of the hands-on term. Keep it above the other two weights so
    /// the hands-on signal dominates ranking.
    #[serde(default = "default_hands_on_weight")]
    pub hands_on_weight: f64,

    /// Weight of the saturating popularity term
    #[serde(default = "default_popularity_weight")]
    pub popularity_weight: f64,

    /// Weight of the freshness term; keep it the smallest
    #[serde(default = "default_freshness_weight")]
    pub freshness_weight: f64,

    /// Freshness decay half-life in days
    #[serde(default = "default_freshness_half_life_days")]
    pub freshness_half_life_days: f64,
}

fn default_hands_on_weight() -> f64 {
    3.0
}
fn default_popularity_weight() -> f64 {
    2.0
}
fn default_freshness_weight() -> f64 {
    0.5
}
fn default_freshness_half_life_days() -> f64 {
    90.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hands_on_weight: default_hands_on_weight(),
            popularity_weight: default_popularity_weight(),
            freshness_weight: default_freshness_weight(),
            freshness_half_life_days: default_freshness_half_life_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.studyclaw/config.toml),
    /// then apply environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Environment variables take priority over file values. The names match
    /// the original deployment so existing `.env` files keep working.
    fn apply_env_overrides(&mut self) {
        fn env(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        }

        if let Some(key) = env("GEMINI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(model) = env("STUDYCLAW_MODEL") {
            self.model.model = model;
        }
        if let Some(id) = env("LEARNING_CALENDAR_ID") {
            self.calendar.calendar_id = Some(id);
        }
        if let Some(token) = env("GOOGLE_CALENDAR_ACCESS_TOKEN") {
            self.calendar.access_token = Some(token);
        }
        if let Some(token) = env("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(sid) = env("TWILIO_ACCOUNT_SID") {
            self.notify.account_sid = Some(sid);
        }
        if let Some(token) = env("TWILIO_AUTH_TOKEN") {
            self.notify.auth_token = Some(token);
        }
        if let Some(from) = env("TWILIO_PHONE_NUMBER") {
            self.notify.from_number = Some(from);
        }
        if let Some(to) = env("LEARNER_PHONE_NUMBER") {
            self.notify.to_number = Some(to);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".studyclaw")
    }

    /// Validate setting ranges. Credential presence is checked separately by
    /// [`AppConfig::require_credentials`] so read-only commands (doctor,
    /// onboard) can load an incomplete config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }
        if self.agent.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "agent.top_k must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        let s = &self.scoring;
        if s.hands_on_weight < 0.0 || s.popularity_weight < 0.0 || s.freshness_weight < 0.0 {
            return Err(ConfigError::ValidationError(
                "scoring weights must be non-negative".into(),
            ));
        }
        if s.hands_on_weight + s.popularity_weight + s.freshness_weight <= 0.0 {
            return Err(ConfigError::ValidationError(
                "scoring weights must not all be zero".into(),
            ));
        }
        if s.freshness_half_life_days <= 0.0 {
            return Err(ConfigError::ValidationError(
                "scoring.freshness_half_life_days must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Check that every credential a planning run needs is present. Called at
    /// startup by `plan` — absence here is a terminal error before any
    /// collaborator is contacted.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        fn require(
            value: &Option<String>,
            name: &'static str,
            env: &'static str,
        ) -> Result<(), ConfigError> {
            if value.as_deref().is_none_or(|v| v.is_empty()) {
                return Err(ConfigError::MissingCredential { name, env });
            }
            Ok(())
        }

        require(&self.model.api_key, "model.api_key", "GEMINI_API_KEY")?;
        require(
            &self.calendar.calendar_id,
            "calendar.calendar_id",
            "LEARNING_CALENDAR_ID",
        )?;
        require(
            &self.calendar.access_token,
            "calendar.access_token",
            "GOOGLE_CALENDAR_ACCESS_TOKEN",
        )?;
        require(
            &self.notify.account_sid,
            "notify.account_sid",
            "TWILIO_ACCOUNT_SID",
        )?;
        require(
            &self.notify.auth_token,
            "notify.auth_token",
            "TWILIO_AUTH_TOKEN",
        )?;
        require(
            &self.notify.from_number,
            "notify.from_number",
            "TWILIO_PHONE_NUMBER",
        )?;
        require(
            &self.notify.to_number,
            "notify.to_number",
            "LEARNER_PHONE_NUMBER",
        )?;
        Ok(())
    }

    /// Generate a default config TOML string (for `onboard`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            calendar: CalendarConfig::default(),
            github: GithubConfig::default(),
            notify: NotifyConfig::default(),
            agent: AgentConfig::default(),
            retry: RetryConfig::default(),
            scoring: ScoringConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required credential {name} — set it in config.toml or via ${env}")]
    MissingCredential { name: &'static str, env: &'static str },
}
