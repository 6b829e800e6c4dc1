//! 无线帧源：带超时、可取消的接收队列。

use crate::IngestError;
use async_trait::async_trait;
use domain::RawFrame;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// 帧源抽象。
#[async_trait]
pub trait FrameSource: Send {
    /// 等待下一帧，超时返回 `Ok(None)`（空闲节拍，不是错误）。
    async fn poll(&mut self, timeout: Duration) -> Result<Option<RawFrame>, IngestError>;

    /// 停止接收并释放底层资源。
    async fn stop(&mut self);
}

/// 基于 mpsc 通道的帧源；可附带一个向通道写入的后台任务。
pub struct ChannelFrameSource {
    receiver: mpsc::Receiver<RawFrame>,
    worker: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl ChannelFrameSource {
    pub fn new(receiver: mpsc::Receiver<RawFrame>) -> Self {
        Self {
            receiver,
            worker: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_worker(
        receiver: mpsc::Receiver<RawFrame>,
        worker: JoinHandle<()>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            worker: Some(worker),
            cancel,
        }
    }

    /// 创建通道并返回发送端，便于测试或自定义接收器接入。
    pub fn channel(capacity: usize) -> (mpsc::Sender<RawFrame>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self::new(receiver))
    }
}

#[async_trait]
impl FrameSource for ChannelFrameSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<RawFrame>, IngestError> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => Err(IngestError::SourceClosed),
            Err(_) => Ok(None),
        }
    }

    async fn stop(&mut self) {
        self.cancel.cancel();
        self.receiver.close();
        if let Some(worker) = self.worker.take() {
            if tokio::time::timeout(Duration::from_secs(1), worker).await.is_err() {
                warn!(target: "homepoll.ingest", "frame source worker did not stop in time");
            }
        }
    }
}
