//! 天气接口轮询：OpenWeather 当前天气 + 天气状态白名单。

use async_trait::async_trait;
use domain::{RawReading, RawValue};
use homepoll_config::{ConfigError, read_json_file};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// 天气接口错误。
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Request(String),
    #[error("weather response invalid: {0}")]
    Response(String),
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        WeatherError::Request(err.to_string())
    }
}

/// 一次天气观测：状态码 + 展平后的读数。
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub condition_id: u32,
    pub reading: RawReading,
}

/// 天气数据提供方。
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self) -> Result<WeatherObservation, WeatherError>;
}

/// OpenWeather 客户端配置。
#[derive(Debug, Clone)]
pub struct OpenWeatherConfig {
    pub base_url: String,
    pub city_id: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// OpenWeather HTTP 客户端。
pub struct OpenWeatherClient {
    client: reqwest::Client,
    config: OpenWeatherConfig,
}

impl OpenWeatherClient {
    pub fn new(config: OpenWeatherConfig) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self) -> Result<WeatherObservation, WeatherError> {
        let url = format!("{}/weather", self.config.base_url.trim_end_matches('/'));
        let response: WeatherResponse = self
            .client
            .get(url)
            .query(&[
                ("id", self.config.city_id.as_str()),
                ("units", "metric"),
                ("appid", self.config.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        observation_from_response(response)
    }
}

#[derive(Debug, Deserialize)]
pub struct WeatherResponse {
    #[serde(default)]
    weather: Vec<WeatherCondition>,
    main: WeatherMain,
    #[serde(default)]
    wind: Option<WeatherWind>,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    id: u32,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherWind {
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    gust: Option<f64>,
}

/// 展平接口响应；取第一个天气状态作为状态码。
pub fn observation_from_response(
    response: WeatherResponse,
) -> Result<WeatherObservation, WeatherError> {
    let condition = response
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::Response("no weather condition".to_string()))?;

    let mut reading = RawReading::new()
        .with("temp", response.main.temp)
        .with("humidity", response.main.humidity)
        .with("pressure", response.main.pressure);
    if let Some(wind) = response.wind {
        if let Some(speed) = wind.speed {
            reading.insert("wind_speed", RawValue::Numeric(speed), Some("m/s".to_string()));
        }
        if let Some(gust) = wind.gust {
            reading.insert("wind_gust", RawValue::Numeric(gust), Some("m/s".to_string()));
        }
    }
    if let Some(description) = condition.description {
        reading.insert("description", RawValue::Text(description), None);
    }
    Ok(WeatherObservation {
        condition_id: condition.id,
        reading,
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AllowlistFile {
    Map(BTreeMap<String, Value>),
    List(Vec<u32>),
}

/// 允许发布的天气状态码集合。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeatherAllowlist {
    ids: HashSet<u32>,
}

impl WeatherAllowlist {
    pub fn new(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// 读取白名单文件（对象的键或数组元素为状态码）。
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file: AllowlistFile = read_json_file(path)?;
        Self::from_file(file).map_err(|err| ConfigError::File(path.display().to_string(), err))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let file: AllowlistFile = serde_json::from_str(raw)
            .map_err(|err| ConfigError::Invalid("weather states".to_string(), err.to_string()))?;
        Self::from_file(file)
            .map_err(|err| ConfigError::Invalid("weather states".to_string(), err))
    }

    fn from_file(file: AllowlistFile) -> Result<Self, String> {
        match file {
            AllowlistFile::List(ids) => Ok(Self::new(ids)),
            AllowlistFile::Map(entries) => {
                let ids = entries
                    .keys()
                    .map(|key| {
                        key.trim()
                            .parse::<u32>()
                            .map_err(|_| format!("invalid condition id: {}", key))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::new(ids))
            }
        }
    }

    pub fn contains(&self, condition_id: u32) -> bool {
        self.ids.contains(&condition_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
