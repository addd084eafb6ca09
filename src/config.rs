use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::sync::Arc;
use std::time::Duration;

// above this the controller may fall back to local operation between keep-alives
const MAX_RECOMMENDED_REFRESH_MS: u64 = 20000;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub wr3223: Wr3223,
    pub mqtt: Mqtt,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Tcp { host: String, port: u16 },
    Serial { path: String },
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Target::Serial { path } => write!(f, "{}", path),
        }
    }
}

// Wr3223 {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Wr3223 {
    #[serde(default = "Config::default_controller_addr")]
    pub controller_addr: u8,

    pub host: Option<String>,
    pub port: Option<u16>,
    pub serial_port: Option<String>,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "Config::default_refresh")]
    pub refresh: Duration,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "Config::default_read_timeout")]
    pub read_timeout: Duration,
}

impl Wr3223 {
    pub fn controller_addr(&self) -> u8 {
        self.controller_addr
    }

    pub fn refresh(&self) -> Duration {
        self.refresh
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Exactly one of `host`+`port` or `serial_port` must be set.
    pub fn target(&self) -> Result<Target> {
        match (&self.host, self.port, &self.serial_port) {
            (Some(host), Some(port), None) => Ok(Target::Tcp {
                host: host.clone(),
                port,
            }),
            (None, None, Some(path)) => Ok(Target::Serial { path: path.clone() }),
            (Some(_), None, None) => bail!("wr3223.port is required with wr3223.host"),
            (None, Some(_), None) => bail!("wr3223.host is required with wr3223.port"),
            (None, None, None) => bail!("wr3223 needs either host and port or serial_port"),
            _ => bail!("wr3223 can't have both host/port and serial_port"),
        }
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,
}

impl Mqtt {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
} // }}}

#[derive(Clone, Debug)]
pub struct ConfigWrapper {
    config: Arc<Config>,
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        Ok(Self::from_config(Config::new(file)?))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn wr3223(&self) -> &Wr3223 {
        &self.config.wr3223
    }

    pub fn mqtt(&self) -> &Mqtt {
        &self.config.mqtt
    }

    pub fn loglevel(&self) -> &str {
        &self.config.loglevel
    }

    pub fn log_summary(&self) {
        self.config.log_summary()
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Logged once logging is set up, which needs the config first.
    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  WR3223:");
        info!("    Controller address: {}", self.wr3223.controller_addr);
        if let Ok(target) = self.wr3223.target() {
            info!("    Target: {}", target);
        }
        info!("    Refresh: {}ms", self.wr3223.refresh.as_millis());
        info!("    Read timeout: {}ms", self.wr3223.read_timeout.as_millis());
        if self.wr3223.refresh.as_millis() > MAX_RECOMMENDED_REFRESH_MS as u128 {
            warn!(
                "wr3223.refresh of {}ms is above {}ms, the controller may drop to manual operation between polls",
                self.wr3223.refresh.as_millis(),
                MAX_RECOMMENDED_REFRESH_MS
            );
        }

        info!("  MQTT: {}", if self.mqtt.enabled { "enabled" } else { "disabled" });
        if self.mqtt.enabled {
            info!("    Host: {}", self.mqtt.host);
            info!("    Port: {}", self.mqtt.port);
            info!("    Namespace: {}", self.mqtt.namespace);
        }

        info!("  Log Level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        self.wr3223.target()?;

        if self.wr3223.port == Some(0) {
            bail!("wr3223.port must be between 1 and 65535");
        }
        if self.wr3223.refresh.is_zero() {
            bail!("wr3223.refresh must be greater than 0");
        }
        if self.wr3223.read_timeout.is_zero() {
            bail!("wr3223.read_timeout must be greater than 0");
        }

        if self.mqtt.enabled {
            if self.mqtt.port == 0 {
                bail!("mqtt.port must be between 1 and 65535");
            }
            if self.mqtt.host.is_empty() {
                bail!("mqtt.host cannot be empty");
            }
        }

        Ok(())
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_namespace() -> String {
        "wr3223".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_controller_addr() -> u8 {
        1
    }

    fn default_refresh() -> Duration {
        Duration::from_millis(15000)
    }

    fn default_read_timeout() -> Duration {
        Duration::from_millis(3000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn tcp_config_with_defaults() {
        let config = Config::from_yaml(
            r#"
wr3223:
  host: 10.0.0.5
  port: 8899
mqtt:
  host: localhost
"#,
        )
        .unwrap();

        assert_eq!(config.wr3223.controller_addr, 1);
        assert_eq!(config.wr3223.refresh, Duration::from_millis(15000));
        assert_eq!(config.wr3223.read_timeout, Duration::from_millis(3000));
        assert_eq!(
            config.wr3223.target().unwrap(),
            Target::Tcp {
                host: "10.0.0.5".to_string(),
                port: 8899
            }
        );
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.namespace, "wr3223");
        assert_eq!(config.loglevel, "info");
    }

    #[test]
    fn serial_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "wr3223:\n  controller_addr: 2\n  serial_port: /dev/ttyUSB0\n  refresh: 10000\nmqtt:\n  enabled: false\n  host: ''\nloglevel: debug"
        )
        .unwrap();

        let config = ConfigWrapper::new(file.path().to_string_lossy().into_owned()).unwrap();

        assert_eq!(config.wr3223().controller_addr(), 2);
        assert_eq!(config.wr3223().refresh(), Duration::from_millis(10000));
        assert_eq!(
            config.wr3223().target().unwrap(),
            Target::Serial {
                path: "/dev/ttyUSB0".to_string()
            }
        );
        assert!(!config.mqtt().enabled());
        assert_eq!(config.loglevel(), "debug");
    }

    #[test]
    fn exactly_one_target() {
        let both = "wr3223:\n  host: a\n  port: 1\n  serial_port: /dev/ttyS0\nmqtt:\n  host: localhost\n";
        assert!(Config::from_yaml(both).is_err());

        let neither = "wr3223: {}\nmqtt:\n  host: localhost\n";
        assert!(Config::from_yaml(neither).is_err());

        let no_port = "wr3223:\n  host: a\nmqtt:\n  host: localhost\n";
        assert!(Config::from_yaml(no_port).is_err());
    }

    #[test]
    fn missing_file() {
        assert!(Config::new("/nonexistent/config.yaml".to_string()).is_err());
    }
}
