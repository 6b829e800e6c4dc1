//! MQTT 无线网关接入：订阅 `{prefix}/#`，主题末段为发送方标识。

use crate::source::ChannelFrameSource;
use domain::{RawFrame, now_epoch_ms};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// MQTT 帧源配置。
#[derive(Debug, Clone)]
pub struct MqttSourceConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    /// 接收队列容量，满时丢弃新帧。
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize)]
struct FrameEnvelope {
    #[serde(default)]
    rorg: u8,
}

/// 启动 MQTT 接收任务，返回从队列读取的帧源。
///
/// 必须在 tokio 运行时内调用。
pub fn spawn_mqtt_source(config: MqttSourceConfig) -> ChannelFrameSource {
    let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();

    let client_id = format!("homepoll-radio-{}", uuid::Uuid::new_v4());
    let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(username), Some(password)) = (config.username.clone(), config.password.clone()) {
        options.set_credentials(username, password);
    }
    let (client, mut eventloop) = AsyncClient::new(options, 10);
    let prefix = config.topic_prefix.trim_end_matches('/').to_string();
    let topic = format!("{}/#", prefix);

    let worker = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = worker_cancel.cancelled() => break,
                event = eventloop.poll() => event,
            };
            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // 每次（重）连接后重新订阅
                    info!(target: "homepoll.ingest", topic = %topic, "radio_gateway_connected");
                    if let Err(err) = client.try_subscribe(topic.clone(), QoS::AtMostOnce) {
                        warn!(target: "homepoll.ingest", error = %err, "radio_subscribe_failed");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let Some(frame) = frame_from_message(&prefix, &publish.topic, &publish.payload, now_epoch_ms()) else {
                        debug!(target: "homepoll.ingest", topic = %publish.topic, "mqtt topic skipped");
                        continue;
                    };
                    match sender.try_send(frame) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(frame)) => {
                            warn!(target: "homepoll.ingest", sender = %frame.sender, "radio_queue_full");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "homepoll.ingest", error = %err, "radio_gateway_error");
                    tokio::select! {
                        _ = worker_cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }
        let _ = client.try_disconnect();
    });

    ChannelFrameSource::with_worker(receiver, worker, cancel)
}

/// 由主题和报文构造原始帧；主题不在前缀下或缺少发送方时返回 `None`。
pub fn frame_from_message(
    prefix: &str,
    topic: &str,
    payload: &[u8],
    received_at_ms: i64,
) -> Option<RawFrame> {
    let prefix = prefix.trim_matches('/');
    let topic = topic.trim_matches('/');
    let rest = if prefix.is_empty() {
        topic
    } else {
        topic.strip_prefix(prefix)?.strip_prefix('/')?
    };
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    let rorg = serde_json::from_slice::<FrameEnvelope>(payload)
        .map(|envelope| envelope.rorg)
        .unwrap_or(0);
    Some(RawFrame {
        sender: rest.to_string(),
        rorg,
        payload: payload.to_vec(),
        received_at_ms,
    })
}
