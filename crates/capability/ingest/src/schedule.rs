//! 周期任务调度：每个任务注册一次，按固定间隔运行直到取消。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// 周期任务。
#[async_trait]
pub trait RecurringTask: Send + Sync {
    fn name(&self) -> &str;

    /// 执行一次；错误只记录，不影响下一次运行。
    async fn run(&self) -> Result<(), TaskError>;
}

/// 周期任务调度器。
///
/// 同一任务的两次运行不会重叠；不同任务互不阻塞。
pub struct Scheduler {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            handles: Vec::new(),
        }
    }

    /// 注册任务：立即运行一次，之后每隔 `period` 运行。
    pub fn every(&mut self, period: Duration, task: Arc<dyn RecurringTask>) {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let result = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = task.run() => result,
                };
                match result {
                    Ok(()) => debug!(target: "homepoll.ingest", task = task.name(), "task_run"),
                    Err(err) => warn!(
                        target: "homepoll.ingest",
                        task = task.name(),
                        error = %err,
                        "task_failed"
                    ),
                }
            }
            debug!(target: "homepoll.ingest", task = task.name(), "task_stopped");
        });
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 等待所有任务退出（需先触发取消）。
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(target: "homepoll.ingest", error = %err, "task_join_failed");
            }
        }
    }
}
