//! Service configuration.
//!
//! Settings come from a TOML file (`flosim.toml` by default, path
//! overridable via `FLOSIM_CONFIG`) with secrets layered on top from the
//! environment (loaded from `.env` by the binary). Every field has a
//! sensible default so the service runs out of the box in demo mode.

use serde::Deserialize;

use crate::advisor::{
    DEFAULT_ADVISORY_TIMEOUT_SECS, DEFAULT_CACHE_TTL_SECS, DEFAULT_MIN_CALL_INTERVAL_SECS,
    LocationContext,
};
use crate::alert::cooldown::DEFAULT_COOLDOWN_MINUTES;
use crate::logging::LogLevel;
use crate::sms::DEFAULT_SEND_TIMEOUT_SECS;

/// Environment variable naming the config file path.
pub const CONFIG_PATH_ENV: &str = "FLOSIM_CONFIG";

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "flosim.toml";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config read error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Provider API base, Twilio-compatible layout.
    pub api_url: String,
    /// Account SID; usually from `SMS_ACCOUNT_SID`.
    pub account_sid: String,
    /// Auth token; usually from `SMS_AUTH_TOKEN`.
    pub auth_token: String,
    /// Sending number; usually from `SMS_FROM_NUMBER`.
    pub from_number: String,
    pub timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        SmsConfig {
            api_url: "https://api.twilio.com/2010-04-01".to_string(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub enabled: bool,
    pub api_url: String,
    /// Usually from `ADVISORY_API_KEY`.
    pub api_key: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: i64,
    pub min_call_interval_secs: i64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        AdvisoryConfig {
            enabled: false,
            api_url:
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
                    .to_string(),
            api_key: String::new(),
            timeout_secs: DEFAULT_ADVISORY_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            min_call_interval_secs: DEFAULT_MIN_CALL_INTERVAL_SECS,
        }
    }
}

/// A recipient seeded into the in-memory store in demo mode.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoRecipient {
    pub phone: String,
    pub name: String,
    pub area: String,
    pub latitude: f64,
    pub longitude: f64,
}

// ---------------------------------------------------------------------------
// Root config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Seconds between generation ticks. Clamped by the coordinator.
    pub interval_secs: u64,
    /// Minimum minutes between two alerts to the same recipient.
    pub cooldown_minutes: i64,
    /// Demo mode: in-memory store and console SMS.
    pub demo_mode: bool,
    pub log_level: String,
    pub log_file: Option<String>,
    /// Path to a scoring-pipeline JSON artifact; absent means synthetic
    /// scoring.
    pub model_artifact: Option<String>,
    /// Postgres connection string; usually from `DATABASE_URL`.
    pub database_url: Option<String>,
    pub sms: SmsConfig,
    pub advisory: AdvisoryConfig,
    pub location: LocationContext,
    pub demo_recipients: Vec<DemoRecipient>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            interval_secs: 30,
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            demo_mode: true,
            log_level: "info".to_string(),
            log_file: None,
            model_artifact: None,
            database_url: None,
            sms: SmsConfig::default(),
            advisory: AdvisoryConfig::default(),
            location: LocationContext::default(),
            demo_recipients: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Parses a TOML document. Unknown keys are ignored; missing keys
    /// take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads the config file, or returns defaults when it does not exist.
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io(e.to_string())),
        }
    }

    /// Layers environment variables over file values. Secrets should
    /// live in the environment, not the config file.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.database_url = Some(url);
            }
        }
        if let Ok(sid) = std::env::var("SMS_ACCOUNT_SID") {
            if !sid.is_empty() {
                self.sms.account_sid = sid;
            }
        }
        if let Ok(token) = std::env::var("SMS_AUTH_TOKEN") {
            if !token.is_empty() {
                self.sms.auth_token = token;
            }
        }
        if let Ok(from) = std::env::var("SMS_FROM_NUMBER") {
            if !from.is_empty() {
                self.sms.from_number = from;
            }
        }
        if let Ok(key) = std::env::var("ADVISORY_API_KEY") {
            if !key.is_empty() {
                self.advisory.api_key = key;
            }
        }
    }

    /// Parsed minimum log level; unknown names fall back to Info.
    pub fn min_log_level(&self) -> LogLevel {
        match self.log_level.to_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    /// True when the SMS provider is fully configured.
    pub fn sms_configured(&self) -> bool {
        !self.sms.account_sid.is_empty()
            && !self.sms.auth_token.is_empty()
            && !self.sms.from_number.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
