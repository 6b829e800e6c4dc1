//! InfluxDB（1.x HTTP API）时序写入实现

use crate::error::StorageError;
use crate::line_protocol::encode_points;
use crate::traits::{TimePrecision, TimeSeriesStore};
use domain::Measurement;
use std::time::Duration;
use tracing::debug;

/// InfluxDB 连接参数。
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

/// InfluxDB 时序存储
pub struct InfluxStore {
    config: InfluxConfig,
    http: reqwest::Client,
}

impl InfluxStore {
    pub fn new(config: InfluxConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn auth_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            params.push(("u", username.clone()));
            params.push(("p", password.clone()));
        }
        params
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::new(format!(
        "influxdb responded {}: {}",
        status,
        body.trim()
    )))
}

#[async_trait::async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn create_database(&self, name: &str) -> Result<(), StorageError> {
        let mut params = self.auth_params();
        params.push(("q", format!("CREATE DATABASE \"{}\"", name.replace('"', "\\\""))));
        let response = self
            .http
            .post(self.endpoint("query"))
            .query(&params)
            .send()
            .await?;
        ensure_success(response).await
    }

    async fn write_points(
        &self,
        points: &[Measurement],
        database: &str,
        precision: TimePrecision,
    ) -> Result<(), StorageError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = encode_points(points, precision);
        debug!(target: "homepoll.storage", database, points = points.len(), "influx_write");
        let mut params = self.auth_params();
        params.push(("db", database.to_string()));
        params.push(("precision", precision.as_str().to_string()));
        let response = self
            .http
            .post(self.endpoint("write"))
            .query(&params)
            .body(body)
            .send()
            .await?;
        ensure_success(response).await
    }
}
