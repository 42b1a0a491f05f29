pub mod validate;

pub use validate::validate_config;

use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::Result;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "signalbot.toml";

const ENV_PREFIX: &str = "SIGNALBOT";

/// Flat variables understood for compatibility with existing `.env` files.
/// They take precedence over everything else.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("SUPABASE_URL", "backend.url"),
    ("SUPABASE_SERVICE_ROLE_KEY", "backend.service_key"),
    ("DATABASE_URL", "backend.database_url"),
    ("MT5_BRIDGE_URL", "terminal.bridge_url"),
    ("MT5_LOGIN", "terminal.login"),
    ("MT5_PASSWORD", "terminal.password"),
    ("MT5_SERVER", "terminal.server"),
    ("POLL_INTERVAL", "trading.poll_interval_secs"),
    ("BOT_USER_ID", "audit.operator_id"),
];

/// String that never shows up in `Debug` output
#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("\"***\"")
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Supabase / PostgREST over HTTPS
    #[default]
    Rest,
    /// Direct Postgres connection
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub url: String,
    pub service_key: Secret,
    pub database_url: Option<Secret>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub bridge_url: String,
    pub api_token: Option<Secret>,
    pub login: u64,
    pub password: Secret,
    pub server: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            bridge_url: "http://127.0.0.1:8228".to_string(),
            api_token: None,
            login: 0,
            password: Secret::default(),
            server: "XMGlobal-MT5".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub min_confidence: f64,
    /// Lots per order
    pub volume: f64,
    /// Max price deviation in points
    pub deviation: u32,
    pub magic: u64,
    pub order_spacing_secs: u64,
    pub poll_interval_secs: u64,
    /// Total signal-fetch failures tolerated before the bot gives up
    pub max_fetch_errors: u32,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            min_confidence: 70.0,
            volume: 0.01,
            deviation: 20,
            magic: 234000,
            order_spacing_secs: 2,
            poll_interval_secs: 30,
            max_fetch_errors: 10,
        }
    }
}

impl TradingConfig {
    pub fn order_spacing(&self) -> Duration {
        Duration::from_secs(self.order_spacing_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Attributed on every execution row and audit event
    pub operator_id: Option<Uuid>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            operator_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is not set
    pub filter: String,
    /// Plain-text log file; empty disables it
    pub file: PathBuf,
    pub mask_account: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "signalbot=info".to_string(),
            file: PathBuf::from("signalbot.log"),
            mask_account: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub backend: BackendConfig,
    pub terminal: TerminalConfig,
    pub trading: TradingConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

impl BotConfig {
    /// Load defaults, the config file, `SIGNALBOT_*` variables and the legacy
    /// flat variables, then validate.
    ///
    /// An explicit `path` must exist; the default `signalbot.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = match path {
            Some(path) => Config::builder().add_source(File::from(path).required(true)),
            None => Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        Self::finish(builder, |name| std::env::var(name).ok())
    }

    fn finish<F>(mut builder: ConfigBuilder<DefaultState>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, key) in LEGACY_ENV {
            let value = lookup(var).filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let config: BotConfig = builder.build()?.try_deserialize()?;
        validate_config(&config)?;

        Ok(config)
    }

    /// Operator id, only valid after validation
    pub fn operator_id(&self) -> Uuid {
        self.audit.operator_id.unwrap_or_default()
    }
}
