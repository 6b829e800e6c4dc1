//! 家庭传感器采集进程：无线帧或桥接/天气轮询 -> 规整 -> 时序库。
//!
//! 用法：`homepoll [host:port]`，可选参数覆盖 MQTT 网关地址。

mod bridge;
mod context;
mod radio;

use context::AppContext;
use homepoll_config::{AppConfig, ConfigError, RunMode};
use homepoll_pipeline::{PublishError, Publisher, RetryPolicy};
use homepoll_registry::DeviceRegistry;
use homepoll_storage::{InfluxConfig, InfluxStore};
use homepoll_telemetry::{init_tracing, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 初始化结构化日志，配置错误也需要落到日志里
    init_tracing();
    // 从环境变量加载运行配置，命令行参数可覆盖网关地址
    let config = load_config(std::env::args().nth(1).as_deref())?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    // 设备注册表在启动期一次性加载，非法配置直接退出
    let registry = Arc::new(DeviceRegistry::load(&config.devices_file)?);

    let store = Arc::new(InfluxStore::new(InfluxConfig {
        url: config.influx_url.clone(),
        username: config.influx_username.clone(),
        password: config.influx_password.clone(),
        timeout: Duration::from_secs(config.http_timeout_seconds),
    })?);
    let policy = RetryPolicy::fixed(Duration::from_millis(config.connect_retry_ms));
    let publisher =
        match Publisher::connect(store, config.influx_database.clone(), &policy, &cancel).await {
            Ok(publisher) => publisher,
            Err(PublishError::Cancelled) => {
                info!(target: "homepoll.app", "shutdown before store connected");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

    let context = AppContext::new(registry, publisher, cancel.clone());
    let result: Result<(), BoxError> = match config.mode {
        RunMode::Radio => radio::run(&config, &context).await.map_err(Into::into),
        RunMode::Bridge => bridge::run(&config, &context).await,
    };

    let snapshot = metrics().snapshot();
    match result {
        Ok(()) => {
            info!(target: "homepoll.app", metrics = ?snapshot, "shutdown complete");
            Ok(())
        }
        Err(err) => {
            error!(target: "homepoll.app", error = %err, metrics = ?snapshot, "stopped on error");
            Err(err)
        }
    }
}

/// 读取环境配置并应用可选的 `host:port` 参数；失败时记录一条错误日志。
fn load_config(endpoint: Option<&str>) -> Result<AppConfig, ConfigError> {
    let result = AppConfig::from_env().and_then(|mut config| {
        if let Some(endpoint) = endpoint {
            config.apply_endpoint(endpoint)?;
        }
        Ok(config)
    });
    if let Err(err) = &result {
        error!(target: "homepoll.app", kind = "config", error = %err, "config_invalid");
    }
    result
}

/// Ctrl-C / SIGTERM 触发取消。
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!(target: "homepoll.app", "received shutdown signal");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            error!(target: "homepoll.app", error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
