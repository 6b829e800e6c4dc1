//! 桥接模式：灯光纠正与天气轮询两个周期任务。

use crate::context::{AppContext, EventOutcome, publish_batch};
use async_trait::async_trait;
use domain::{PublishBatch, now_epoch_ms};
use homepoll_config::{AppConfig, Credentials};
use homepoll_control::{HueBridge, HueConfig, LightBridge, LightRules, apply_corrections};
use homepoll_ingest::{
    OpenWeatherClient, OpenWeatherConfig, RecurringTask, Scheduler, TaskError, WeatherAllowlist,
    WeatherProvider,
};
use homepoll_normalize::normalize;
use homepoll_pipeline::Publisher;
use homepoll_registry::DeviceRegistry;
use homepoll_telemetry::{record_measurements_normalized, record_poll_failure};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// 周期性纠正房间灯光。
pub struct LightOverrideTask {
    bridge: Arc<dyn LightBridge>,
    rules: Arc<LightRules>,
}

impl LightOverrideTask {
    pub fn new(bridge: Arc<dyn LightBridge>, rules: Arc<LightRules>) -> Self {
        Self { bridge, rules }
    }
}

#[async_trait]
impl RecurringTask for LightOverrideTask {
    fn name(&self) -> &str {
        "light_override"
    }

    async fn run(&self) -> Result<(), TaskError> {
        let report = apply_corrections(self.bridge.as_ref(), &self.rules)
            .await
            .inspect_err(|_| record_poll_failure())?;
        debug!(
            target: "homepoll.app",
            applied = report.applied,
            failed = report.failed,
            "light_override_done"
        );
        Ok(())
    }
}

/// 周期性拉取天气并发布。
pub struct WeatherPollTask {
    provider: Arc<dyn WeatherProvider>,
    allowlist: WeatherAllowlist,
    device: String,
    registry: Arc<DeviceRegistry>,
    publisher: Publisher,
}

impl WeatherPollTask {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        allowlist: WeatherAllowlist,
        device: impl Into<String>,
        registry: Arc<DeviceRegistry>,
        publisher: Publisher,
    ) -> Self {
        Self {
            provider,
            allowlist,
            device: device.into(),
            registry,
            publisher,
        }
    }

    pub async fn poll_once(&self) -> Result<EventOutcome, TaskError> {
        let observation = self
            .provider
            .current()
            .await
            .inspect_err(|_| record_poll_failure())?;
        if !self.allowlist.contains(observation.condition_id) {
            debug!(
                target: "homepoll.app",
                condition_id = observation.condition_id,
                "weather_state_not_listed"
            );
            return Ok(EventOutcome::Ignored);
        }
        let Some(entry) = self.registry.lookup(&self.device) else {
            return Err(format!("weather device not registered: {}", self.device).into());
        };

        let now_ms = now_epoch_ms();
        let measurements = normalize(entry, &observation.reading, now_ms);
        record_measurements_normalized(measurements.len());
        info!(
            target: "homepoll.app",
            source = %self.device,
            condition_id = observation.condition_id,
            measurements = measurements.len(),
            "weather_observed"
        );
        let batch = PublishBatch::new(self.device.as_str(), now_ms, measurements);
        Ok(publish_batch(&self.publisher, &batch).await)
    }
}

#[async_trait]
impl RecurringTask for WeatherPollTask {
    fn name(&self) -> &str {
        "weather_poll"
    }

    async fn run(&self) -> Result<(), TaskError> {
        self.poll_once().await.map(|_| ())
    }
}

/// 装配桥接模式的两个任务并运行到取消。
pub async fn run(config: &AppConfig, context: &AppContext) -> Result<(), TaskError> {
    let credentials = Credentials::load(&config.credentials_file)?;
    let rules = Arc::new(LightRules::load(&config.light_rules_file)?);
    let allowlist = WeatherAllowlist::load(&config.weather_states_file)?;
    if context.registry.lookup(&config.weather_device).is_none() {
        return Err(format!("weather device not registered: {}", config.weather_device).into());
    }
    let http_timeout = Duration::from_secs(config.http_timeout_seconds);

    let bridge_address = config.hue_bridge.clone().unwrap_or_default();
    let bridge = HueBridge::new(HueConfig {
        bridge: bridge_address,
        username: credentials.hue_user()?.to_string(),
        timeout: http_timeout,
    })?;
    let weather = OpenWeatherClient::new(OpenWeatherConfig {
        base_url: config.weather_url.clone(),
        city_id: config.weather_city_id.clone(),
        api_key: credentials.openweather_key()?.to_string(),
        timeout: http_timeout,
    })?;

    info!(
        target: "homepoll.app",
        rooms = rules.len(),
        weather_states = allowlist.len(),
        override_period_seconds = config.override_period_seconds,
        weather_period_seconds = config.weather_period_seconds,
        "bridge_mode_started"
    );

    let mut scheduler = Scheduler::new(context.cancel.clone());
    scheduler.every(
        Duration::from_secs(config.override_period_seconds),
        Arc::new(LightOverrideTask::new(Arc::new(bridge), rules)),
    );
    scheduler.every(
        Duration::from_secs(config.weather_period_seconds),
        Arc::new(WeatherPollTask::new(
            Arc::new(weather),
            allowlist,
            config.weather_device.clone(),
            context.registry.clone(),
            context.publisher.clone(),
        )),
    );

    context.cancel.cancelled().await;
    scheduler.join().await;
    Ok(())
}
