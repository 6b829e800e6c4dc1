//! 房间灯光纠正规则（`settings.json`）。
//!
//! ```json
//! { "bedroom": { "unwanted": { "ct": 366 }, "default": { "ct": 447 } } }
//! ```

use homepoll_config::{ConfigError, read_json_file};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// 规则加载错误。
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("room {room}: unwanted attribute {attribute} has no default")]
    MissingDefault { room: String, attribute: String },
    #[error("room name must not be empty")]
    EmptyRoom,
    #[error("rules config error: {0}")]
    Config(String),
}

impl From<ConfigError> for RuleError {
    fn from(err: ConfigError) -> Self {
        RuleError::Config(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RoomRuleFile {
    #[serde(default)]
    unwanted: Map<String, Value>,
    #[serde(default)]
    default: Map<String, Value>,
}

/// 单个房间的规则。
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRule {
    /// 灯名包含该字符串即视为属于此房间。
    pub room: String,
    pub unwanted: Map<String, Value>,
    pub default: Map<String, Value>,
}

/// 全部房间规则（按房间名有序）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightRules {
    rooms: Vec<RoomRule>,
}

impl LightRules {
    pub fn new(rooms: Vec<RoomRule>) -> Result<Self, RuleError> {
        for rule in &rooms {
            if rule.room.is_empty() {
                return Err(RuleError::EmptyRoom);
            }
            if let Some(attribute) = rule
                .unwanted
                .keys()
                .find(|attribute| !rule.default.contains_key(*attribute))
            {
                return Err(RuleError::MissingDefault {
                    room: rule.room.clone(),
                    attribute: attribute.clone(),
                });
            }
        }
        Ok(Self { rooms })
    }

    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let file: BTreeMap<String, RoomRuleFile> = read_json_file(path)?;
        Self::from_file(file)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, RuleError> {
        let file: BTreeMap<String, RoomRuleFile> =
            serde_json::from_str(raw).map_err(|err| RuleError::Config(err.to_string()))?;
        Self::from_file(file)
    }

    fn from_file(file: BTreeMap<String, RoomRuleFile>) -> Result<Self, RuleError> {
        let rooms = file
            .into_iter()
            .map(|(room, rule)| RoomRule {
                room,
                unwanted: rule.unwanted,
                default: rule.default,
            })
            .collect();
        Self::new(rooms)
    }

    pub fn rooms(&self) -> &[RoomRule] {
        &self.rooms
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
