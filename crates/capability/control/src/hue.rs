//! Philips Hue 桥接 REST 客户端。

use crate::{BridgeError, LightBridge, LightState};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Hue 桥接配置。
#[derive(Debug, Clone)]
pub struct HueConfig {
    /// 桥接地址（IP 或 `http://host`）。
    pub bridge: String,
    pub username: String,
    pub timeout: Duration,
}

/// Hue 桥接客户端。
pub struct HueBridge {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct HueLight {
    name: String,
    state: Map<String, Value>,
}

impl HueBridge {
    pub fn new(config: HueConfig) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| BridgeError::Request(err.to_string()))?;
        let host = config.bridge.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        Ok(Self {
            client,
            base_url: format!("{}/api/{}", host, config.username),
        })
    }
}

#[async_trait]
impl LightBridge for HueBridge {
    async fn lights(&self) -> Result<Vec<LightState>, BridgeError> {
        let body: Value = self
            .client
            .get(format!("{}/lights", self.base_url))
            .send()
            .await
            .map_err(|err| BridgeError::Request(err.to_string()))?
            .error_for_status()
            .map_err(|err| BridgeError::Request(err.to_string()))?
            .json()
            .await
            .map_err(|err| BridgeError::Response(err.to_string()))?;
        check_errors(&body)?;
        let lights: BTreeMap<String, HueLight> =
            serde_json::from_value(body).map_err(|err| BridgeError::Response(err.to_string()))?;
        Ok(lights
            .into_iter()
            .map(|(id, light)| LightState::from_attributes(id, light.name, light.state))
            .collect())
    }

    async fn set_state(&self, light_id: &str, attributes: &Map<String, Value>) -> Result<(), BridgeError> {
        let body: Value = self
            .client
            .put(format!("{}/lights/{}/state", self.base_url, light_id))
            .json(attributes)
            .send()
            .await
            .map_err(|err| BridgeError::Request(err.to_string()))?
            .error_for_status()
            .map_err(|err| BridgeError::Request(err.to_string()))?
            .json()
            .await
            .map_err(|err| BridgeError::Response(err.to_string()))?;
        check_errors(&body)
    }
}

/// Hue 以 HTTP 200 + `[{"error": {...}}]` 报告失败。
fn check_errors(body: &Value) -> Result<(), BridgeError> {
    let Some(items) = body.as_array() else {
        return Ok(());
    };
    let errors: Vec<String> = items
        .iter()
        .filter_map(|item| item.get("error"))
        .map(|error| {
            error
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string()
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(BridgeError::Rejected(errors.join("; ")))
    }
}
