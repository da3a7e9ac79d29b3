//! Worker configuration
//!
//! Read from the process environment, after loading an optional `.env`
//! file.
//!
//! | Variable                     | Default       |
//! |------------------------------|---------------|
//! | `NC_CONFIGURATION`           | `production`  |
//! | `NC_RABBITMQ_DEFAULT_USER`   | none          |
//! | `NC_RABBITMQ_DEFAULT_PASS`   | none          |
//! | `NC_RABBITMQ_DEFAULT_VHOST`  | none          |
//! | `NC_RABBITMQ_HOST`           | `rabbitmq`    |
//! | `NC_GEOSERVER_URI`           | required      |
//! | `NC_GEOSERVER_USER`          | required      |
//! | `NC_GEOSERVER_PASSWORD`      | required      |
//! | `NC_CLIENT_NOTIFIER_URI`     | required      |
//! | `NC_TARGET_CRS`              | `EPSG:3857`   |
//! | `NC_HTTP_TIMEOUT_SECS`       | `30`          |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::raster::Crs;

const DEFAULT_BROKER_HOST: &str = "rabbitmq";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    Testing,
    #[default]
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "testing" => Ok(Environment::Testing),
            "production" => Ok(Environment::Production),
            other => Err(format!("expected development, testing or production, got '{other}'")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Testing => f.write_str("testing"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Message broker connection details, passed on to the transport bridge.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub vhost: Option<String>,
}

impl fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("vhost", &self.vhost)
            .finish()
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.to_string(),
            user: None,
            password: None,
            vhost: None,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct Settings {
    pub environment: Environment,
    pub broker: BrokerSettings,
    pub geoserver_uri: String,
    pub geoserver_user: String,
    pub geoserver_password: String,
    pub client_notifier_uri: String,
    pub target_crs: Crs,
    pub http_timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("environment", &self.environment)
            .field("broker", &self.broker)
            .field("geoserver_uri", &self.geoserver_uri)
            .field("geoserver_user", &self.geoserver_user)
            .field("client_notifier_uri", &self.client_notifier_uri)
            .field("target_crs", &self.target_crs)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = Settings::builder().broker(BrokerSettings {
            host: get("NC_RABBITMQ_HOST").unwrap_or_else(|| DEFAULT_BROKER_HOST.to_string()),
            user: get("NC_RABBITMQ_DEFAULT_USER"),
            password: get("NC_RABBITMQ_DEFAULT_PASS"),
            vhost: get("NC_RABBITMQ_DEFAULT_VHOST"),
        });

        if let Some(value) = get("NC_CONFIGURATION") {
            builder = builder.environment(parse("NC_CONFIGURATION", &value)?);
        }
        if let Some(value) = get("NC_GEOSERVER_URI") {
            builder = builder.geoserver_uri(value);
        }
        if let Some(value) = get("NC_GEOSERVER_USER") {
            builder = builder.geoserver_user(value);
        }
        if let Some(value) = get("NC_GEOSERVER_PASSWORD") {
            builder = builder.geoserver_password(value);
        }
        if let Some(value) = get("NC_CLIENT_NOTIFIER_URI") {
            builder = builder.client_notifier_uri(value);
        }
        if let Some(value) = get("NC_TARGET_CRS") {
            builder = builder.target_crs(parse("NC_TARGET_CRS", &value)?);
        }
        if let Some(value) = get("NC_HTTP_TIMEOUT_SECS") {
            let secs: u64 = parse("NC_HTTP_TIMEOUT_SECS", &value)?;
            builder = builder.http_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Builder for [`Settings`]
#[derive(Default)]
pub struct SettingsBuilder {
    environment: Option<Environment>,
    broker: Option<BrokerSettings>,
    geoserver_uri: Option<String>,
    geoserver_user: Option<String>,
    geoserver_password: Option<String>,
    client_notifier_uri: Option<String>,
    target_crs: Option<Crs>,
    http_timeout: Option<Duration>,
}

impl SettingsBuilder {
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn broker(mut self, broker: BrokerSettings) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn geoserver_uri(mut self, uri: impl Into<String>) -> Self {
        self.geoserver_uri = Some(uri.into());
        self
    }

    pub fn geoserver_user(mut self, user: impl Into<String>) -> Self {
        self.geoserver_user = Some(user.into());
        self
    }

    pub fn geoserver_password(mut self, password: impl Into<String>) -> Self {
        self.geoserver_password = Some(password.into());
        self
    }

    pub fn client_notifier_uri(mut self, uri: impl Into<String>) -> Self {
        self.client_notifier_uri = Some(uri.into());
        self
    }

    pub fn target_crs(mut self, crs: Crs) -> Self {
        self.target_crs = Some(crs);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        Ok(Settings {
            environment: self.environment.unwrap_or_default(),
            broker: self.broker.unwrap_or_default(),
            geoserver_uri: self
                .geoserver_uri
                .ok_or(ConfigError::Missing("NC_GEOSERVER_URI"))?,
            geoserver_user: self
                .geoserver_user
                .ok_or(ConfigError::Missing("NC_GEOSERVER_USER"))?,
            geoserver_password: self
                .geoserver_password
                .ok_or(ConfigError::Missing("NC_GEOSERVER_PASSWORD"))?,
            client_notifier_uri: self
                .client_notifier_uri
                .ok_or(ConfigError::Missing("NC_CLIENT_NOTIFIER_URI"))?,
            target_crs: self.target_crs.unwrap_or_default(),
            http_timeout: self
                .http_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("NC_GEOSERVER_URI", "http://geoserver:8080/geoserver/rest"),
        ("NC_GEOSERVER_USER", "admin"),
        ("NC_GEOSERVER_PASSWORD", "geoserver"),
        ("NC_CLIENT_NOTIFIER_URI", "http://notifier/notify"),
    ];

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.broker.host, "rabbitmq");
        assert_eq!(settings.broker.user, None);
        assert_eq!(settings.target_crs, Crs::WEB_MERCATOR);
        assert_eq!(settings.http_timeout, Duration::from_secs(30));
        assert_eq!(settings.geoserver_user, "admin");
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("NC_CONFIGURATION", "development"),
            ("NC_RABBITMQ_HOST", "localhost"),
            ("NC_RABBITMQ_DEFAULT_USER", "guest"),
            ("NC_TARGET_CRS", "EPSG:28992"),
            ("NC_HTTP_TIMEOUT_SECS", "5"),
        ]);

        let settings = Settings::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.broker.host, "localhost");
        assert_eq!(settings.broker.user.as_deref(), Some("guest"));
        assert_eq!(settings.target_crs, Crs::from_epsg(28992));
        assert_eq!(settings.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_catalog_uri() {
        let result = Settings::from_lookup(lookup(&REQUIRED[1..]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("NC_GEOSERVER_URI"));
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("NC_HTTP_TIMEOUT_SECS", "soon"));
        assert_matches!(
            Settings::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "NC_HTTP_TIMEOUT_SECS", .. })
        );

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("NC_CONFIGURATION", "staging"));
        assert_matches!(
            Settings::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "NC_CONFIGURATION", .. })
        );
    }

    #[test]
    fn test_builder() {
        let settings = Settings::builder()
            .geoserver_uri("http://localhost/rest")
            .geoserver_user("admin")
            .geoserver_password("secret")
            .client_notifier_uri("http://localhost/notify")
            .target_crs(Crs::WGS84)
            .build()
            .unwrap();

        assert_eq!(settings.target_crs, Crs::WGS84);
        assert!(!format!("{settings:?}").contains("secret"));
    }
}
