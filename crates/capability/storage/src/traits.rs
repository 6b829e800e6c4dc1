//! 时序存储接口 Trait 定义
//!
//! 设计原则：
//! - 线格式完全由实现负责，流水线只传递测量值
//! - `create_database` 幂等，可用作连接探测
//! - 实现需支持并发调用（多个定时任务共用一个存储）

use crate::error::StorageError;
use async_trait::async_trait;
use domain::Measurement;

/// 写入时间戳精度。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePrecision {
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimePrecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimePrecision::Seconds => "s",
            TimePrecision::Milliseconds => "ms",
            TimePrecision::Microseconds => "u",
            TimePrecision::Nanoseconds => "ns",
        }
    }

    /// 将毫秒时间戳换算为该精度下的整数。
    pub fn from_epoch_ms(&self, ts_ms: i64) -> i64 {
        match self {
            TimePrecision::Seconds => ts_ms.div_euclid(1000),
            TimePrecision::Milliseconds => ts_ms,
            TimePrecision::Microseconds => ts_ms.saturating_mul(1_000),
            TimePrecision::Nanoseconds => ts_ms.saturating_mul(1_000_000),
        }
    }
}

/// 时序存储客户端接口
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// 创建数据库（已存在时视为成功）
    async fn create_database(&self, name: &str) -> Result<(), StorageError>;

    /// 以一次请求写入一组测量值
    async fn write_points(
        &self,
        points: &[Measurement],
        database: &str,
        precision: TimePrecision,
    ) -> Result<(), StorageError>;
}
