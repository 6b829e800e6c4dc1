//! # Homepoll Ingest 模块
//!
//! 数据接入：无线帧源与解码、天气轮询、周期任务调度。
//!
//! - [`source`]：`FrameSource` 抽象与基于通道的实现（带超时接收、可停止）
//! - [`mqtt`]：经 MQTT 网关接收无线帧
//! - [`decoder`]：按设备解码参数把帧转为字段表
//! - [`weather`]：天气接口客户端与状态白名单
//! - [`schedule`]：周期任务调度器

pub mod decoder;
pub mod mqtt;
pub mod schedule;
pub mod source;
pub mod weather;

pub use decoder::{DecodeError, FrameDecoder, JsonFrameDecoder};
pub use mqtt::{MqttSourceConfig, spawn_mqtt_source};
pub use schedule::{RecurringTask, Scheduler, TaskError};
pub use source::{ChannelFrameSource, FrameSource};
pub use weather::{
    OpenWeatherClient, OpenWeatherConfig, WeatherAllowlist, WeatherError, WeatherObservation,
    WeatherProvider,
};

/// 采集错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("source closed")]
    SourceClosed,
}
