//! Configuration for the carrot-home bridge.
//!
//! Layering is built-in defaults, then the TOML file, then environment
//! variables (`CARROT_HOME_` prefix, `__` between section and key, e.g.
//! `CARROT_HOME_MQTT__SERVER`). [`Config::into_settings`] validates the
//! result and turns it into the runtime types the other crates consume.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use carrot_api::{TlsMode, TransportConfig};
use carrot_bridge::{MqttSettings, TopicScheme};
use carrot_core::{AccountCredentials, CacheConfig};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CARROT_HOME_";

const MQTT_PORT: u16 = 1883;
const MQTT_TLS_PORT: u16 = 8883;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing required setting {field}")]
    Missing { field: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::Missing { field: field.into() })
}

// ── TOML config structs ─────────────────────────────────────────────

/// Raw configuration as read from file and environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub carrot: CarrotSection,
    pub mqtt: MqttSection,
    pub bridge: BridgeSection,
    pub cache: CacheSection,
}

/// Carrot cloud account.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CarrotSection {
    /// Cloud base URL.
    pub server: Option<String>,
    pub user: Option<String>,
    /// Plaintext in the file; wrapped in a `SecretString` once loaded.
    pub pass: Option<String>,
    /// Verify the cloud's TLS certificate.
    pub validate_https: bool,
    /// HTTP request timeout in seconds.
    pub timeout: u64,
}

impl Default for CarrotSection {
    fn default() -> Self {
        Self {
            server: None,
            user: None,
            pass: None,
            validate_https: true,
            timeout: 30,
        }
    }
}

/// MQTT broker.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    pub server: Option<String>,
    /// Defaults to 8883 with TLS, 1883 without.
    pub port: Option<u16>,
    pub use_tls: bool,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive: u64,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            server: None,
            port: None,
            use_tls: false,
            user: None,
            pass: None,
            client_id: "carrot-home".into(),
            keep_alive: 30,
        }
    }
}

impl MqttSection {
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.use_tls {
            MQTT_TLS_PORT
        } else {
            MQTT_PORT
        })
    }
}

/// Topic naming.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub discovery_prefix: String,
    pub echo_prefix: String,
    pub object_prefix: String,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            discovery_prefix: "homeassistant".into(),
            echo_prefix: "carrot".into(),
            object_prefix: "carrothome".into(),
        }
    }
}

/// Cache timing, all in seconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub settle_delay: u64,
    pub poll_interval: u64,
    pub renewal_interval: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            settle_delay: 3,
            poll_interval: 3,
            renewal_interval: 3 * 60 * 60,
        }
    }
}

// ── Validated settings ──────────────────────────────────────────────

/// Everything the binary needs to wire the bridge together.
#[derive(Debug)]
pub struct Settings {
    pub server: Url,
    pub account: AccountCredentials,
    pub transport: TransportConfig,
    pub mqtt: MqttSettings,
    pub topics: TopicScheme,
    pub cache: CacheConfig,
}

impl Config {
    /// Validate and convert to runtime settings.
    ///
    /// Errors name the offending setting as `section.key`.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let Config {
            carrot,
            mqtt,
            bridge,
            cache,
        } = self;

        // Carrot cloud
        let raw_server = required(carrot.server, "carrot.server")?;
        let server = Url::parse(&raw_server)
            .map_err(|e| invalid("carrot.server", format!("{raw_server:?} is not a URL: {e}")))?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(invalid("carrot.server", "expected an http or https URL"));
        }
        let email = required(carrot.user, "carrot.user")?;
        if email.trim().is_empty() {
            return Err(invalid("carrot.user", "must not be empty"));
        }
        let password = SecretString::from(required(carrot.pass, "carrot.pass")?);
        if carrot.timeout == 0 {
            return Err(invalid("carrot.timeout", "must be at least 1 second"));
        }
        let transport = TransportConfig {
            tls: if carrot.validate_https {
                TlsMode::System
            } else {
                TlsMode::DangerAcceptInvalid
            },
            timeout: Duration::from_secs(carrot.timeout),
            ..TransportConfig::default()
        };

        // MQTT
        let port = mqtt.effective_port();
        let host = required(mqtt.server, "mqtt.server")?;
        if host.trim().is_empty() {
            return Err(invalid("mqtt.server", "must not be empty"));
        }
        if port == 0 {
            return Err(invalid("mqtt.port", "must not be 0"));
        }
        if mqtt.pass.is_some() && mqtt.user.is_none() {
            return Err(invalid("mqtt.user", "required when mqtt.pass is set"));
        }
        if mqtt.client_id.is_empty() || mqtt.client_id.starts_with(' ') {
            return Err(invalid(
                "mqtt.client_id",
                "must be non-empty and not start with a space",
            ));
        }
        if mqtt.keep_alive == 0 {
            return Err(invalid("mqtt.keep_alive", "must be at least 1 second"));
        }
        let mqtt_settings = MqttSettings {
            host,
            port,
            use_tls: mqtt.use_tls,
            user: mqtt.user,
            password: mqtt.pass.map(SecretString::from),
            client_id: mqtt.client_id,
            keep_alive: Duration::from_secs(mqtt.keep_alive),
        };

        // Topics
        check_topic_segment("bridge.discovery_prefix", &bridge.discovery_prefix, true)?;
        check_topic_segment("bridge.echo_prefix", &bridge.echo_prefix, true)?;
        check_topic_segment("bridge.object_prefix", &bridge.object_prefix, false)?;
        let topics = TopicScheme::new(
            bridge.discovery_prefix,
            bridge.echo_prefix,
            bridge.object_prefix,
        );

        // Cache
        if cache.poll_interval == 0 {
            return Err(invalid("cache.poll_interval", "must be at least 1 second"));
        }
        if cache.renewal_interval == 0 {
            return Err(invalid("cache.renewal_interval", "must be at least 1 second"));
        }
        let cache = CacheConfig {
            settle_delay: Duration::from_secs(cache.settle_delay),
            poll_interval: Duration::from_secs(cache.poll_interval),
            renewal_interval: Duration::from_secs(cache.renewal_interval),
            ..CacheConfig::default()
        };

        Ok(Settings {
            server,
            account: AccountCredentials { email, password },
            transport,
            mqtt: mqtt_settings,
            topics,
            cache,
        })
    }
}

/// Topic prefixes end up inside subscription filters, so wildcards are out.
fn check_topic_segment(field: &str, value: &str, allow_levels: bool) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if value.contains(['+', '#']) {
        return Err(invalid(field, "must not contain MQTT wildcards"));
    }
    if !allow_levels && value.contains('/') {
        return Err(invalid(field, "must not contain '/'"));
    }
    if value.starts_with('/') || value.ends_with('/') {
        return Err(invalid(field, "must not start or end with '/'"));
    }
    Ok(())
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "carrot-home", "carrot-home").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("carrot-home");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// File + environment providers, in precedence order.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load the raw config.
///
/// An explicitly requested file must exist; the default location may be
/// absent, in which case only the environment is consulted.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(path) if !path.is_file() => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Some(path) => path.to_path_buf(),
        None => config_path(),
    };

    Ok(figment(&path).extract()?)
}

/// Load and validate in one step.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    load_config(explicit)?.into_settings()
}
