//! 日志初始化、事件 ID 与流水线计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 流水线指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_ignored: u64,
    pub decode_failures: u64,
    pub measurements_normalized: u64,
    pub batches_published: u64,
    pub batches_skipped: u64,
    pub publish_failures: u64,
    pub poll_failures: u64,
    pub light_corrections: u64,
}

/// 流水线计数指标。
pub struct PipelineMetrics {
    frames_received: AtomicU64,
    frames_ignored: AtomicU64,
    decode_failures: AtomicU64,
    measurements_normalized: AtomicU64,
    batches_published: AtomicU64,
    batches_skipped: AtomicU64,
    publish_failures: AtomicU64,
    poll_failures: AtomicU64,
    light_corrections: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_ignored: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            measurements_normalized: AtomicU64::new(0),
            batches_published: AtomicU64::new(0),
            batches_skipped: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            light_corrections: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_ignored: self.frames_ignored.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            measurements_normalized: self.measurements_normalized.load(Ordering::Relaxed),
            batches_published: self.batches_published.load(Ordering::Relaxed),
            batches_skipped: self.batches_skipped.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            light_corrections: self.light_corrections.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static PipelineMetrics {
    METRICS.get_or_init(PipelineMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成事件 ID，用于串联同一事件的日志。
pub fn new_event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录收到的无线帧。
pub fn record_frame_received() {
    metrics().frames_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录未注册设备被过滤的帧。
pub fn record_frame_ignored() {
    metrics().frames_ignored.fetch_add(1, Ordering::Relaxed);
}

/// 记录解码失败次数。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录规范化输出的测量值数量。
pub fn record_measurements_normalized(count: usize) {
    metrics()
        .measurements_normalized
        .fetch_add(count as u64, Ordering::Relaxed);
}

/// 记录成功写入的批次。
pub fn record_batch_published() {
    metrics().batches_published.fetch_add(1, Ordering::Relaxed);
}

/// 记录空批次（未调用存储）。
pub fn record_batch_skipped() {
    metrics().batches_skipped.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入失败并被丢弃的批次。
pub fn record_publish_failure() {
    metrics().publish_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录桥接 / 天气轮询失败。
pub fn record_poll_failure() {
    metrics().poll_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录下发的灯光纠正。
pub fn record_light_correction() {
    metrics().light_corrections.fetch_add(1, Ordering::Relaxed);
}
