//! 运行期共享上下文与批次发布的统一出口。

use domain::PublishBatch;
use homepoll_pipeline::{PublishOutcome, Publisher};
use homepoll_registry::DeviceRegistry;
use homepoll_telemetry::{record_batch_published, record_batch_skipped, record_publish_failure};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 启动期构建、显式传入各事件循环与定时任务的客户端句柄。
#[derive(Clone)]
pub struct AppContext {
    pub registry: Arc<DeviceRegistry>,
    pub publisher: Publisher,
    pub cancel: CancellationToken,
}

impl AppContext {
    pub fn new(registry: Arc<DeviceRegistry>, publisher: Publisher, cancel: CancellationToken) -> Self {
        Self {
            registry,
            publisher,
            cancel,
        }
    }
}

/// 单个事件的处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// 未登记的设备，静默过滤。
    Ignored,
    DecodeFailed,
    /// 没有可发布的测量值。
    Empty,
    Published(usize),
    PublishFailed,
}

/// 发布批次并记录结果；失败只记录，不向上传播。
pub async fn publish_batch(publisher: &Publisher, batch: &PublishBatch) -> EventOutcome {
    match publisher.publish(batch).await {
        Ok(PublishOutcome::Skipped) => {
            record_batch_skipped();
            debug!(target: "homepoll.app", source = %batch.source(), "nothing_to_publish");
            EventOutcome::Empty
        }
        Ok(PublishOutcome::Written(count)) => {
            record_batch_published();
            for measurement in batch.measurements() {
                info!(
                    target: "homepoll.app",
                    source = %batch.source(),
                    name = %measurement.name,
                    value = %measurement.value,
                    ts_ms = measurement.ts_ms,
                    "PUB"
                );
            }
            EventOutcome::Published(count)
        }
        Err(err) => {
            record_publish_failure();
            warn!(
                target: "homepoll.app",
                source = %batch.source(),
                kind = "publish",
                points = batch.len(),
                error = %err,
                "publish_failed"
            );
            EventOutcome::PublishFailed
        }
    }
}
