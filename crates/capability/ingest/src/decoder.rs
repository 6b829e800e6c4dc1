//! 帧解码：按设备的解码参数把原始帧转为字段表。
//!
//! 网关已完成 EEP 位域解析，报文形如：
//! `{"rorg":165,"func":2,"type":5,"fields":{"TMP":{"value":21.4,"unit":"°C"}}}`。
//! 字段也可写成裸值：`{"fields":{"TMP":21.4}}`。

use domain::{DecodeProfile, RawFrame, RawReading, RawValue};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// 解码错误。
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("profile mismatch on {field}: expected {expected}, got {actual}")]
    ProfileMismatch {
        field: &'static str,
        expected: u8,
        actual: u8,
    },
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// 解码器抽象，由外部编解码能力实现。
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &RawFrame, profile: &DecodeProfile) -> Result<RawReading, DecodeError>;
}

#[derive(Debug, Deserialize)]
struct FramePayload {
    #[serde(default)]
    func: Option<u8>,
    #[serde(default, rename = "type")]
    type_code: Option<u8>,
    #[serde(default)]
    fields: BTreeMap<String, FieldPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldPayload {
    Detailed {
        value: Value,
        #[serde(default)]
        unit: Option<String>,
    },
    Bare(Value),
}

/// 网关 JSON 报文解码器。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFrameDecoder;

impl JsonFrameDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for JsonFrameDecoder {
    fn decode(&self, frame: &RawFrame, profile: &DecodeProfile) -> Result<RawReading, DecodeError> {
        let payload: FramePayload = serde_json::from_slice(&frame.payload)
            .map_err(|err| DecodeError::InvalidPayload(err.to_string()))?;

        if let DecodeProfile::Eep {
            rorg,
            func,
            type_code,
        } = profile
        {
            check("rorg", *rorg, Some(frame.rorg))?;
            check("func", *func, payload.func)?;
            check("type", *type_code, payload.type_code)?;
        }

        let mut reading = RawReading::new();
        for (name, field) in payload.fields {
            let (value, unit) = match field {
                FieldPayload::Detailed { value, unit } => (value, unit),
                FieldPayload::Bare(value) => (value, None),
            };
            match raw_value(value) {
                Some(value) => reading.insert(name, value, unit),
                None => {
                    debug!(target: "homepoll.ingest", sender = %frame.sender, field = %name, "field skipped");
                }
            }
        }
        Ok(reading)
    }
}

fn check(field: &'static str, expected: u8, actual: Option<u8>) -> Result<(), DecodeError> {
    match actual {
        Some(actual) if actual != expected => Err(DecodeError::ProfileMismatch {
            field,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

/// JSON 值转原始值；布尔按开关语义转为 `on` / `off`。
pub fn raw_value(value: Value) -> Option<RawValue> {
    match value {
        Value::Number(number) => number.as_f64().map(RawValue::Numeric),
        Value::String(text) => Some(RawValue::Text(text)),
        Value::Bool(flag) => Some(RawValue::Text(if flag { "on" } else { "off" }.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(rorg: u8, payload: &str) -> RawFrame {
        RawFrame {
            sender: "01:80:F5:BC".to_string(),
            rorg,
            payload: payload.as_bytes().to_vec(),
            received_at_ms: 0,
        }
    }

    fn a5_02_05() -> DecodeProfile {
        DecodeProfile::Eep {
            rorg: 0xA5,
            func: 0x02,
            type_code: 0x05,
        }
    }

    #[test]
    fn decodes_detailed_and_bare_fields() {
        let reading = JsonFrameDecoder
            .decode(
                &frame(
                    0xA5,
                    r#"{"rorg":165,"func":2,"type":5,"fields":{"TMP":{"value":21.4,"unit":"°C"},"HUM":55}}"#,
                ),
                &a5_02_05(),
            )
            .expect("decoded");
        assert_eq!(reading.value("TMP"), Some(&RawValue::Numeric(21.4)));
        assert_eq!(reading.get("TMP").and_then(|field| field.unit.as_deref()), Some("°C"));
        assert_eq!(reading.value("HUM"), Some(&RawValue::Numeric(55.0)));
    }

    #[test]
    fn text_and_bool_fields_become_text() {
        let reading = JsonFrameDecoder
            .decode(
                &frame(0xA5, r#"{"fields":{"PIRS":"on","SVC":true,"RAW":null}}"#),
                &a5_02_05(),
            )
            .expect("decoded");
        assert_eq!(reading.value("PIRS"), Some(&RawValue::Text("on".to_string())));
        assert_eq!(reading.value("SVC"), Some(&RawValue::Text("on".to_string())));
        assert!(reading.value("RAW").is_none());
    }

    #[test]
    fn rejects_wrong_rorg() {
        let err = JsonFrameDecoder
            .decode(&frame(0xF6, r#"{"fields":{"TMP":1}}"#), &a5_02_05())
            .expect_err("mismatch");
        assert_eq!(
            err,
            DecodeError::ProfileMismatch {
                field: "rorg",
                expected: 0xA5,
                actual: 0xF6
            }
        );
    }

    #[test]
    fn rejects_wrong_type() {
        let err = JsonFrameDecoder
            .decode(&frame(0xA5, r#"{"func":2,"type":7,"fields":{}}"#), &a5_02_05())
            .expect_err("mismatch");
        assert!(matches!(err, DecodeError::ProfileMismatch { field: "type", .. }));
    }

    #[test]
    fn rejects_malformed_payload() {
        let err = JsonFrameDecoder
            .decode(&frame(0xA5, "\u{1}\u{2}"), &a5_02_05())
            .expect_err("invalid");
        assert!(matches!(err, DecodeError::InvalidPayload(_)));
    }

    #[test]
    fn passthrough_skips_profile_checks() {
        let reading = JsonFrameDecoder
            .decode(&frame(0, r#"{"fields":{"temp":3.5}}"#), &DecodeProfile::Passthrough)
            .expect("decoded");
        assert_eq!(reading.len(), 1);
    }
}
