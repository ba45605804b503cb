//! TuitionBell configuration system.
//!
//! Settings come from `~/.tuitionbell/config.toml` (or an explicit path),
//! then environment variables override individual keys.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TuitionError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuitionBellConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub startup: StartupConfig,
}

impl TuitionBellConfig {
    /// Load config from the default path, falling back to defaults, then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("TUITIONBELL_CONFIG")
            .map(|p| PathBuf::from(shellexpand::tilde(&p).to_string()))
            .unwrap_or_else(|_| Self::default_path());
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TuitionError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TuitionError::Config(format!("Failed to parse config: {e}")))
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| TuitionError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the TuitionBell home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tuitionbell")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SUPABASE_URL") {
            self.store.url = v;
        }
        if let Some(v) = get("SUPABASE_ANON_KEY") {
            self.store.api_key = v;
        }
        if let Some(v) = get("TUITIONBELL_STORE") {
            match StoreBackend::parse(&v) {
                Some(backend) => self.store.backend = backend,
                None => tracing::warn!("⚠️ Ignoring unknown TUITIONBELL_STORE '{v}'"),
            }
        }
        if let Some(v) = get("TUITIONBELL_DB") {
            self.store.sqlite_path = v;
        }
        if let Some(v) = get("EMAIL_SERVER") {
            self.email.smtp_host = v;
        }
        if let Some(v) = get("EMAIL_PORT") {
            match v.parse() {
                Ok(port) => self.email.smtp_port = port,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid EMAIL_PORT '{v}'"),
            }
        }
        if let Some(v) = get("EMAIL_FROM") {
            self.email.username = v;
        }
        if let Some(v) = get("EMAIL_PASSWORD") {
            self.email.password = v;
        }
        if let Some(v) = get("EMAIL_FROM_ADDRESS") {
            self.email.from_address = Some(v);
        }
        if let Some(v) = get("PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid PORT '{v}'"),
            }
        }
        if let Some(v) = get("NOTIFY_HOUR") {
            match v.parse() {
                Ok(hour) => self.schedule.hour = hour,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid NOTIFY_HOUR '{v}'"),
            }
        }
        if let Some(v) = get("NOTIFY_STRICT_CONFIG") {
            self.startup.strict_config = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    /// Check the settings required before the engine can reach its store.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        match self.store.backend {
            StoreBackend::Postgrest => {
                if self.store.url.trim().is_empty() {
                    missing.push("store.url (SUPABASE_URL)");
                }
                if self.store.api_key.trim().is_empty() {
                    missing.push("store.api_key (SUPABASE_ANON_KEY)");
                }
            }
            StoreBackend::Sqlite => {
                if self.store.sqlite_path.trim().is_empty() {
                    missing.push("store.sqlite_path (TUITIONBELL_DB)");
                }
            }
        }
        if !missing.is_empty() {
            return Err(TuitionError::Config(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }
        self.schedule.validate()
    }
}

impl TuitionBellConfig {
    /// Startup gate. Strict mode fails on any `validate()` error; lenient
    /// mode logs it and lets the first store access fail instead.
    pub fn check_startup(&self) -> Result<()> {
        match self.validate() {
            Ok(()) => Ok(()),
            Err(e) if self.startup.strict_config => Err(e),
            Err(e) => {
                tracing::warn!("⚠️ {e} (startup.strict_config = false, continuing)");
                Ok(())
            }
        }
    }
}

/// HTTP trigger server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8000 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which store implementation backs students and the notification log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgrest,
    Sqlite,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgrest" | "supabase" => Some(StoreBackend::Postgrest),
            "sqlite" => Some(StoreBackend::Sqlite),
            _ => None,
        }
    }
}

/// Student data store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// PostgREST base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_sqlite_path() -> String { "~/.tuitionbell/tuitionbell.db".into() }
fn default_timeout_secs() -> u64 { 30 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: String::new(),
            api_key: String::new(),
            sqlite_path: default_sqlite_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// `sqlite_path` with `~` expanded.
    pub fn expanded_sqlite_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.sqlite_path).to_string())
    }
}

/// Outbound SMTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Authenticated sender (SMTP login).
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// `From:` address when it differs from the login.
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_smtp_port() -> u16 { 587 }

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_address: None,
            display_name: None,
        }
    }
}

impl EmailConfig {
    pub fn sender_address(&self) -> &str {
        self.from_address.as_deref().unwrap_or(&self.username)
    }
}

/// Daily trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

fn bool_true() -> bool { true }
fn default_hour() -> u32 { 9 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: default_hour(),
            minute: 0,
        }
    }
}

impl ScheduleConfig {
    /// Five-field cron expression firing once a day.
    pub fn cron_expression(&self) -> String {
        format!("{} {} * * *", self.minute, self.hour)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hour > 23 || self.minute > 59 {
            return Err(TuitionError::Config(format!(
                "Invalid schedule time {:02}:{:02}",
                self.hour, self.minute
            )));
        }
        Ok(())
    }
}

/// Startup policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Refuse to start when store settings are missing. When false, the
    /// problem is logged and surfaces at first use as a data-access error.
    #[serde(default = "bool_true")]
    pub strict_config: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self { strict_config: true }
    }
}
