use domain::PublishBatch;
use homepoll_storage::{TimePrecision, TimeSeriesStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 发布错误。
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("store error: {0}")]
    Store(String),
    #[error("cancelled")]
    Cancelled,
}

/// 单次发布结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 已写入的测量值数量。
    Written(usize),
    /// 空批次，未调用存储。
    Skipped,
}

/// 启动期连接重试参数。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` 表示无限重试。
    pub max_attempts: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }
}

/// 反复调用 `create_database` 直到存储可用，返回尝试次数。
///
/// 失败后按固定间隔重试；取消信号会中断等待。
pub async fn connect_with_retry(
    store: &dyn TimeSeriesStore,
    database: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<usize, PublishError> {
    let mut attempt = 0usize;
    loop {
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        attempt += 1;
        match store.create_database(database).await {
            Ok(()) => {
                info!(target: "homepoll.pipeline", database, attempts = attempt, "store_connected");
                return Ok(attempt);
            }
            Err(err) => {
                warn!(
                    target: "homepoll.pipeline",
                    database,
                    attempt,
                    error = %err,
                    "store_connect_failed"
                );
                if let Some(max_attempts) = policy.max_attempts {
                    if attempt >= max_attempts {
                        return Err(PublishError::Store(err.to_string()));
                    }
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
        }
    }
}

struct PublisherInner {
    store: Arc<dyn TimeSeriesStore>,
    database: String,
    precision: TimePrecision,
}

/// 批次发布器。
///
/// 可克隆，多个定时任务并发调用 `publish` 互不影响；
/// 批次之间唯一共享的是底层存储客户端。
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

impl Publisher {
    pub fn new(store: Arc<dyn TimeSeriesStore>, database: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                store,
                database: database.into(),
                precision: TimePrecision::Milliseconds,
            }),
        }
    }

    /// 建立连接（带重试）后返回发布器。
    pub async fn connect(
        store: Arc<dyn TimeSeriesStore>,
        database: impl Into<String>,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<Self, PublishError> {
        let publisher = Self::new(store, database);
        publisher.reconnect(policy, cancel).await?;
        Ok(publisher)
    }

    /// 重新执行启动期连接流程。
    pub async fn reconnect(
        &self,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<usize, PublishError> {
        connect_with_retry(
            self.inner.store.as_ref(),
            &self.inner.database,
            policy,
            cancel,
        )
        .await
    }

    pub fn database(&self) -> &str {
        &self.inner.database
    }

    /// 以一次写请求发布整个批次；失败不重试，由调用方记录后丢弃。
    pub async fn publish(&self, batch: &PublishBatch) -> Result<PublishOutcome, PublishError> {
        if batch.is_empty() {
            return Ok(PublishOutcome::Skipped);
        }
        self.inner
            .store
            .write_points(
                batch.measurements(),
                &self.inner.database,
                self.inner.precision,
            )
            .await
            .map_err(|err| PublishError::Store(err.to_string()))?;
        debug!(
            target: "homepoll.pipeline",
            source = %batch.source(),
            ts_ms = batch.ts_ms(),
            points = batch.len(),
            "batch_published"
        );
        Ok(PublishOutcome::Written(batch.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Measurement, MeasurementValue};
    use homepoll_storage::InMemoryTimeSeriesStore;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::fixed(Duration::from_millis(1))
    }

    fn sample_batch(source: &str, names: &[&str]) -> PublishBatch {
        let measurements = names
            .iter()
            .map(|name| Measurement {
                name: name.to_string(),
                value: MeasurementValue::F64(1.5),
                ts_ms: 1000,
            })
            .collect();
        PublishBatch::from_measurements(source, measurements)
    }

    async fn connected_store() -> Arc<InMemoryTimeSeriesStore> {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        store.create_database("local").await.expect("create");
        store
    }

    #[tokio::test]
    async fn connect_retries_until_store_accepts() {
        let store = InMemoryTimeSeriesStore::new();
        store.fail_next_connects(3);
        let attempts = connect_with_retry(&store, "local", &quick_policy(), &CancellationToken::new())
            .await
            .expect("connected");
        assert_eq!(attempts, 4);
        assert_eq!(store.connect_attempts(), 4);
        assert!(store.has_database("local"));
    }

    #[tokio::test]
    async fn connect_succeeds_first_time_without_retry() {
        let store = InMemoryTimeSeriesStore::new();
        let attempts = connect_with_retry(&store, "local", &quick_policy(), &CancellationToken::new())
            .await
            .expect("connected");
        assert_eq!(attempts, 1);
        assert_eq!(store.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn connect_respects_max_attempts() {
        let store = InMemoryTimeSeriesStore::new();
        store.set_unavailable(true);
        let policy = RetryPolicy {
            delay: Duration::from_millis(1),
            max_attempts: Some(3),
        };
        let err = connect_with_retry(&store, "local", &policy, &CancellationToken::new())
            .await
            .expect_err("gives up");
        assert!(matches!(err, PublishError::Store(_)));
        assert_eq!(store.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn connect_stops_when_cancelled() {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        store.set_unavailable(true);
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::fixed(Duration::from_secs(3600));

        let task = {
            let store = store.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                connect_with_retry(store.as_ref(), "local", &policy, &cancel).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = task.await.expect("join");
        assert!(matches!(result, Err(PublishError::Cancelled)));
        assert_eq!(store.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_store_call() {
        let store = connected_store().await;
        let publisher = Publisher::new(store.clone(), "local");
        let outcome = publisher
            .publish(&PublishBatch::from_measurements("01:80:F5:BC", Vec::new()))
            .await
            .expect("skipped");
        assert_eq!(outcome, PublishOutcome::Skipped);
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn batch_is_one_write_in_milliseconds() {
        let store = connected_store().await;
        let publisher = Publisher::new(store.clone(), "local");
        let outcome = publisher
            .publish(&sample_batch("05:87:1B:CA", &["balcony_temperature", "balcony_humidity"]))
            .await
            .expect("written");
        assert_eq!(outcome, PublishOutcome::Written(2));

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].database, "local");
        assert_eq!(writes[0].precision, TimePrecision::Milliseconds);
    }

    #[tokio::test]
    async fn store_failure_is_reported_without_retry() {
        let store = connected_store().await;
        store.fail_next_writes(1);
        let publisher = Publisher::new(store.clone(), "local");

        let err = publisher
            .publish(&sample_batch("01:80:F5:BC", &["main_bedroom_temperature"]))
            .await
            .expect_err("store down");
        assert_eq!(err.to_string(), "store error: store unavailable");
        assert_eq!(store.write_attempts(), 1);

        // 下一批次不受影响，且失败批次不会被补发
        publisher
            .publish(&sample_batch("01:80:F5:BC", &["main_bedroom_temperature"]))
            .await
            .expect("written");
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_publishes_do_not_interfere() {
        let store = connected_store().await;
        let publisher = Publisher::new(store.clone(), "local");

        let first = {
            let publisher = publisher.clone();
            tokio::spawn(async move {
                publisher
                    .publish(&sample_batch("openweather:2950159", &["berlin_temperature", "berlin_humidity"]))
                    .await
            })
        };
        let second = {
            let publisher = publisher.clone();
            tokio::spawn(async move {
                publisher
                    .publish(&sample_batch("hue", &["living_light_on"]))
                    .await
            })
        };
        assert_eq!(first.await.expect("join").expect("first"), PublishOutcome::Written(2));
        assert_eq!(second.await.expect("join").expect("second"), PublishOutcome::Written(1));

        let mut sizes: Vec<_> = store.writes().iter().map(|item| item.points.len()).collect();
        sizes.sort();
        assert_eq!(sizes, vec![1, 2]);
    }

    #[tokio::test]
    async fn reconnect_can_be_invoked_again() {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        let cancel = CancellationToken::new();
        let publisher = Publisher::connect(store.clone(), "local", &quick_policy(), &cancel)
            .await
            .expect("connect");
        store.fail_next_connects(1);
        let attempts = publisher.reconnect(&quick_policy(), &cancel).await.expect("reconnect");
        assert_eq!(attempts, 2);
        assert_eq!(publisher.database(), "local");
    }
}
