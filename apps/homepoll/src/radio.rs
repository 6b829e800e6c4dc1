//! 无线模式：接收帧 -> 查表 -> 解码 -> 规整 -> 发布。

use crate::context::{AppContext, EventOutcome, publish_batch};
use domain::{PublishBatch, RawFrame, now_epoch_ms};
use homepoll_config::AppConfig;
use homepoll_ingest::{
    FrameDecoder, FrameSource, IngestError, JsonFrameDecoder, MqttSourceConfig, spawn_mqtt_source,
};
use homepoll_normalize::normalize;
use homepoll_pipeline::Publisher;
use homepoll_registry::DeviceRegistry;
use homepoll_telemetry::{
    new_event_id, record_decode_failure, record_frame_ignored, record_frame_received,
    record_measurements_normalized,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

const QUEUE_CAPACITY: usize = 256;

/// 单帧处理器。
pub struct FrameHandler {
    registry: Arc<DeviceRegistry>,
    decoder: Arc<dyn FrameDecoder>,
    publisher: Publisher,
}

impl FrameHandler {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        decoder: Arc<dyn FrameDecoder>,
        publisher: Publisher,
    ) -> Self {
        Self {
            registry,
            decoder,
            publisher,
        }
    }

    pub async fn handle(&self, frame: RawFrame) -> EventOutcome {
        record_frame_received();
        let Some(entry) = self.registry.lookup(&frame.sender) else {
            record_frame_ignored();
            debug!(target: "homepoll.app", source = %frame.sender, "frame_ignored");
            return EventOutcome::Ignored;
        };

        let reading = match self.decoder.decode(&frame, &entry.profile) {
            Ok(reading) => reading,
            Err(err) => {
                record_decode_failure();
                warn!(
                    target: "homepoll.app",
                    source = %frame.sender,
                    kind = "decode",
                    error = %err,
                    "decode_failed"
                );
                return EventOutcome::DecodeFailed;
            }
        };

        let now_ms = now_epoch_ms();
        let measurements = normalize(entry, &reading, now_ms);
        record_measurements_normalized(measurements.len());
        let batch = PublishBatch::new(frame.sender.as_str(), now_ms, measurements);
        publish_batch(&self.publisher, &batch).await
    }
}

/// 接收循环：带超时轮询帧源，直到取消或帧源失效。
///
/// 取消时返回 `Ok`；帧源失效时返回错误。两种情况下都会停止帧源。
pub async fn run_radio_loop(
    source: &mut dyn FrameSource,
    handler: &FrameHandler,
    poll_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), IngestError> {
    let result = loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            polled = source.poll(poll_timeout) => polled,
        };
        match polled {
            Ok(Some(frame)) => {
                let span = tracing::info_span!("frame", event_id = %new_event_id(), source = %frame.sender);
                handler.handle(frame).instrument(span).await;
            }
            // 空闲节拍
            Ok(None) => {}
            Err(err) => break Err(err),
        }
    };
    source.stop().await;
    result
}

/// 启动 MQTT 帧源并运行接收循环。
pub async fn run(config: &AppConfig, context: &AppContext) -> Result<(), IngestError> {
    info!(
        target: "homepoll.app",
        host = %config.mqtt_host,
        port = config.mqtt_port,
        topic_prefix = %config.mqtt_topic_prefix,
        devices = context.registry.len(),
        "radio_mode_started"
    );
    let mut source = spawn_mqtt_source(MqttSourceConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        topic_prefix: config.mqtt_topic_prefix.clone(),
        queue_capacity: QUEUE_CAPACITY,
    });
    let handler = FrameHandler::new(
        context.registry.clone(),
        Arc::new(JsonFrameDecoder::new()),
        context.publisher.clone(),
    );
    run_radio_loop(
        &mut source,
        &handler,
        Duration::from_millis(config.poll_timeout_ms),
        &context.cancel,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::MeasurementValue;
    use homepoll_ingest::ChannelFrameSource;
    use homepoll_storage::{InMemoryTimeSeriesStore, TimeSeriesStore};

    const DEVICES: &str = r#"{"devices": [
        {
            "identity": "01:80:F5:BC",
            "profile": {"codec": "eep", "rorg": 165, "func": 2, "type": 5},
            "sensors": [{"raw_field": "TMP", "output_name": "main_bedroom_temperature"}]
        },
        {
            "identity": "01:94:E3:B9",
            "profile": {"codec": "eep", "rorg": 165, "func": 7, "type": 1},
            "sensors": [{"raw_field": "PIRS", "output_name": "bathroom_occupancy", "kind": {"occupancy": "numeric"}}]
        }
    ]}"#;

    fn frame(sender: &str, rorg: u8, payload: &str) -> RawFrame {
        RawFrame {
            sender: sender.to_string(),
            rorg,
            payload: payload.as_bytes().to_vec(),
            received_at_ms: 0,
        }
    }

    async fn handler() -> (Arc<InMemoryTimeSeriesStore>, FrameHandler) {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        store.create_database("local").await.expect("create");
        let registry = Arc::new(DeviceRegistry::from_json_str(DEVICES).expect("registry"));
        let handler = FrameHandler::new(
            registry,
            Arc::new(JsonFrameDecoder::new()),
            Publisher::new(store.clone(), "local"),
        );
        (store, handler)
    }

    #[tokio::test]
    async fn registered_frame_is_published_rounded() {
        let (store, handler) = handler().await;
        let outcome = handler
            .handle(frame(
                "01:80:F5:BC",
                0xA5,
                r#"{"rorg":165,"func":2,"type":5,"fields":{"TMP":{"value":21.456,"unit":"°C"}}}"#,
            ))
            .await;
        assert_eq!(outcome, EventOutcome::Published(1));
        let writes = store.writes();
        assert_eq!(writes[0].points[0].name, "main_bedroom_temperature");
        assert_eq!(writes[0].points[0].value, MeasurementValue::F64(21.46));
    }

    #[tokio::test]
    async fn unknown_sender_is_ignored_silently() {
        let (store, handler) = handler().await;
        let outcome = handler
            .handle(frame("FF:FF:FF:FF", 0xA5, r#"{"fields":{"TMP":20}}"#))
            .await;
        assert_eq!(outcome, EventOutcome::Ignored);
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn profile_mismatch_is_dropped() {
        let (store, handler) = handler().await;
        let outcome = handler
            .handle(frame("01:80:F5:BC", 0xF6, r#"{"fields":{"TMP":20}}"#))
            .await;
        assert_eq!(outcome, EventOutcome::DecodeFailed);
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn frame_without_mapped_fields_publishes_nothing() {
        let (store, handler) = handler().await;
        let outcome = handler
            .handle(frame("01:80:F5:BC", 0xA5, r#"{"fields":{"SVC":3.1}}"#))
            .await;
        assert_eq!(outcome, EventOutcome::Empty);
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn occupancy_on_publishes_one() {
        let (store, handler) = handler().await;
        let outcome = handler
            .handle(frame("01:94:E3:B9", 0xA5, r#"{"fields":{"PIRS":"on"}}"#))
            .await;
        assert_eq!(outcome, EventOutcome::Published(1));
        assert_eq!(store.writes()[0].points[0].value, MeasurementValue::I64(1));
    }

    #[tokio::test]
    async fn store_failure_does_not_stop_the_loop() {
        let (store, handler) = handler().await;
        store.fail_next_writes(1);
        let (sender, mut source) = ChannelFrameSource::channel(8);
        let payload = r#"{"fields":{"TMP":20.5}}"#;
        sender.send(frame("01:80:F5:BC", 0xA5, payload)).await.expect("send");
        sender.send(frame("01:80:F5:BC", 0xA5, payload)).await.expect("send");
        drop(sender);

        let cancel = CancellationToken::new();
        let result =
            run_radio_loop(&mut source, &handler, Duration::from_millis(10), &cancel).await;
        assert!(matches!(result, Err(IngestError::SourceClosed)));
        assert_eq!(store.write_attempts(), 2);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_ends_loop_cleanly() {
        let (_store, handler) = handler().await;
        let (_sender, mut source) = ChannelFrameSource::channel(8);
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            stopper.cancel();
        });
        let result =
            run_radio_loop(&mut source, &handler, Duration::from_millis(5), &cancel).await;
        assert!(result.is_ok());
    }
}
