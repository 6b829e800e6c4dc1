//! 应用运行配置加载。

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::env;
use std::path::{Path, PathBuf};

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("config file {0}: {1}")]
    File(String, String),
}

/// 运行模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 监听无线传感器帧。
    Radio,
    /// 轮询灯光桥接与天气接口。
    Bridge,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: RunMode,
    pub influx_url: String,
    pub influx_database: String,
    pub influx_username: Option<String>,
    pub influx_password: Option<String>,
    pub connect_retry_ms: u64,
    pub poll_timeout_ms: u64,
    pub http_timeout_seconds: u64,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic_prefix: String,
    pub devices_file: PathBuf,
    pub light_rules_file: PathBuf,
    pub weather_states_file: PathBuf,
    pub credentials_file: PathBuf,
    pub hue_bridge: Option<String>,
    pub weather_url: String,
    pub weather_city_id: String,
    pub weather_device: String,
    pub override_period_seconds: u64,
    pub weather_period_seconds: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = match env::var("HOMEPOLL_MODE") {
            Ok(value) => parse_mode(&value)?,
            Err(_) => RunMode::Radio,
        };
        let influx_url = env::var("HOMEPOLL_INFLUX_URL")
            .unwrap_or_else(|_| "http://localhost:8086".to_string());
        let influx_database =
            env::var("HOMEPOLL_INFLUX_DATABASE").unwrap_or_else(|_| "local".to_string());
        let influx_username =
            read_optional("HOMEPOLL_INFLUX_USERNAME").or_else(|| Some("root".to_string()));
        let influx_password =
            read_optional("HOMEPOLL_INFLUX_PASSWORD").or_else(|| Some("root".to_string()));
        let connect_retry_ms = read_u64_with_default("HOMEPOLL_CONNECT_RETRY_MS", 1000)?;
        let poll_timeout_ms = read_u64_with_default("HOMEPOLL_POLL_TIMEOUT_MS", 1000)?;
        let http_timeout_seconds = read_u64_with_default("HOMEPOLL_HTTP_TIMEOUT_SECONDS", 10)?;
        let mqtt_host = env::var("HOMEPOLL_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("HOMEPOLL_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("HOMEPOLL_MQTT_USERNAME");
        let mqtt_password = read_optional("HOMEPOLL_MQTT_PASSWORD");
        let mqtt_topic_prefix =
            env::var("HOMEPOLL_MQTT_TOPIC_PREFIX").unwrap_or_else(|_| "enocean/rx".to_string());
        let devices_file = read_path("HOMEPOLL_DEVICES_FILE", "config/devices.json");
        let light_rules_file = read_path("HOMEPOLL_LIGHT_RULES_FILE", "config/settings.json");
        let weather_states_file =
            read_path("HOMEPOLL_WEATHER_STATES_FILE", "config/openweather.json");
        let credentials_file = read_path("HOMEPOLL_CREDENTIALS_FILE", ".philips_hue_secret.json");
        let hue_bridge = read_optional("HOMEPOLL_HUE_BRIDGE");
        let weather_url = env::var("HOMEPOLL_WEATHER_URL")
            .unwrap_or_else(|_| "http://api.openweathermap.org/data/2.5".to_string());
        let weather_city_id =
            env::var("HOMEPOLL_WEATHER_CITY_ID").unwrap_or_else(|_| "2950159".to_string());
        let weather_device = env::var("HOMEPOLL_WEATHER_DEVICE")
            .unwrap_or_else(|_| format!("openweather:{}", weather_city_id));
        let override_period_seconds =
            read_u64_with_default("HOMEPOLL_OVERRIDE_PERIOD_SECONDS", 15)?;
        let weather_period_seconds =
            read_u64_with_default("HOMEPOLL_WEATHER_PERIOD_SECONDS", 600)?;

        if mode == RunMode::Bridge && hue_bridge.is_none() {
            return Err(ConfigError::Missing("HOMEPOLL_HUE_BRIDGE".to_string()));
        }
        for (key, value) in [
            ("HOMEPOLL_POLL_TIMEOUT_MS", poll_timeout_ms),
            ("HOMEPOLL_OVERRIDE_PERIOD_SECONDS", override_period_seconds),
            ("HOMEPOLL_WEATHER_PERIOD_SECONDS", weather_period_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(key.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            mode,
            influx_url,
            influx_database,
            influx_username,
            influx_password,
            connect_retry_ms,
            poll_timeout_ms,
            http_timeout_seconds,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_topic_prefix,
            devices_file,
            light_rules_file,
            weather_states_file,
            credentials_file,
            hue_bridge,
            weather_url,
            weather_city_id,
            weather_device,
            override_period_seconds,
            weather_period_seconds,
        })
    }

    /// 用命令行给出的 `host:port` 覆盖 MQTT 端点。
    pub fn apply_endpoint(&mut self, endpoint: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::Invalid("endpoint".to_string(), endpoint.to_string());
        let (host, port) = endpoint.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        self.mqtt_host = host.to_string();
        self.mqtt_port = port;
        Ok(())
    }
}

/// 外部服务凭据（`.philips_hue_secret.json`）。
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub hue: Option<String>,
    pub openweather: Option<String>,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json_file(path)
    }

    pub fn hue_user(&self) -> Result<&str, ConfigError> {
        self.hue
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("credentials.hue".to_string()))
    }

    pub fn openweather_key(&self) -> Result<&str, ConfigError> {
        self.openweather
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("credentials.openweather".to_string()))
    }
}

/// 读取并解析 JSON 配置文件。
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let display = path.display().to_string();
    let content =
        std::fs::read_to_string(path).map_err(|err| ConfigError::File(display.clone(), err.to_string()))?;
    serde_json::from_str(&content).map_err(|err| ConfigError::File(display, err.to_string()))
}

fn parse_mode(value: &str) -> Result<RunMode, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "radio" => Ok(RunMode::Radio),
        "bridge" => Ok(RunMode::Bridge),
        _ => Err(ConfigError::Invalid(
            "HOMEPOLL_MODE".to_string(),
            value.to_string(),
        )),
    }
}

fn read_path(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
