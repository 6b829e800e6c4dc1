//! # Homepoll Control 模块
//!
//! 灯光“勿扰”纠正：读取桥接上的灯光状态，把命中房间规则中
//! “不想要”属性值的灯恢复为该房间的默认值。
//!
//! - [`rules`]：房间规则加载与校验
//! - [`hue`]：Philips Hue REST 客户端

pub mod hue;
pub mod rules;

pub use hue::{HueBridge, HueConfig};
pub use rules::{LightRules, RoomRule, RuleError};

use async_trait::async_trait;
use homepoll_telemetry::record_light_correction;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// 灯光桥接错误。
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge request failed: {0}")]
    Request(String),
    #[error("bridge response invalid: {0}")]
    Response(String),
    #[error("bridge rejected request: {0}")]
    Rejected(String),
}

/// 单盏灯的当前状态。
#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    pub id: String,
    pub name: String,
    pub reachable: bool,
    pub on: bool,
    /// 桥接返回的完整状态属性（含 `on` / `reachable`）。
    pub attributes: Map<String, Value>,
}

impl LightState {
    pub fn from_attributes(
        id: impl Into<String>,
        name: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        let flag = |key: &str| attributes.get(key).and_then(Value::as_bool).unwrap_or(false);
        Self {
            id: id.into(),
            name: name.into(),
            reachable: flag("reachable"),
            on: flag("on"),
            attributes,
        }
    }
}

/// 灯光桥接抽象。
#[async_trait]
pub trait LightBridge: Send + Sync {
    async fn lights(&self) -> Result<Vec<LightState>, BridgeError>;
    async fn set_state(&self, light_id: &str, attributes: &Map<String, Value>) -> Result<(), BridgeError>;
}

/// 一次待下发的纠正：某盏灯在某房间规则下需要恢复的属性。
#[derive(Debug, Clone, PartialEq)]
pub struct LightCorrection {
    pub light_id: String,
    pub room: String,
    pub attributes: Map<String, Value>,
}

/// 计算需要下发的纠正（纯函数，不访问桥接）。
///
/// 灯名包含房间名、可达且已开启时才检查；属性当前值等于 unwanted 值时
/// 取该房间的 default 值。每盏灯每个房间最多一条纠正。
pub fn compute_corrections(lights: &[LightState], rules: &LightRules) -> Vec<LightCorrection> {
    let mut corrections = Vec::new();
    for light in lights {
        if !light.reachable || !light.on {
            continue;
        }
        for rule in rules.rooms() {
            if !light.name.contains(&rule.room) {
                continue;
            }
            let mut attributes = Map::new();
            for (attribute, unwanted) in &rule.unwanted {
                if light.attributes.get(attribute) != Some(unwanted) {
                    continue;
                }
                if let Some(default) = rule.default.get(attribute) {
                    attributes.insert(attribute.clone(), default.clone());
                }
            }
            if !attributes.is_empty() {
                corrections.push(LightCorrection {
                    light_id: light.id.clone(),
                    room: rule.room.clone(),
                    attributes,
                });
            }
        }
    }
    corrections
}

/// 纠正执行结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    pub applied: usize,
    pub failed: usize,
}

/// 读取灯光状态并下发纠正；单盏灯失败只记录，不影响其余灯。
pub async fn apply_corrections(
    bridge: &dyn LightBridge,
    rules: &LightRules,
) -> Result<CorrectionReport, BridgeError> {
    let lights = bridge.lights().await?;
    let mut report = CorrectionReport::default();
    for correction in compute_corrections(&lights, rules) {
        info!(
            target: "homepoll.control",
            light_id = %correction.light_id,
            room = %correction.room,
            attributes = %serde_json::Value::Object(correction.attributes.clone()),
            "unwanted light state, setting back"
        );
        match bridge.set_state(&correction.light_id, &correction.attributes).await {
            Ok(()) => {
                record_light_correction();
                report.applied += 1;
            }
            Err(err) => {
                warn!(
                    target: "homepoll.control",
                    light_id = %correction.light_id,
                    error = %err,
                    "light_correction_failed"
                );
                report.failed += 1;
            }
        }
    }
    Ok(report)
}
