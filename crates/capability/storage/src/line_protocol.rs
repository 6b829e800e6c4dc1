//! InfluxDB 行协议编码
//!
//! 每个测量值编码为一行：`<measurement> value=<field> <timestamp>`。

use crate::traits::TimePrecision;
use domain::{Measurement, MeasurementValue};

/// 将一组测量值编码为行协议文本（以 `\n` 分隔）。
pub fn encode_points(points: &[Measurement], precision: TimePrecision) -> String {
    points
        .iter()
        .map(|point| encode_point(point, precision))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn encode_point(point: &Measurement, precision: TimePrecision) -> String {
    format!(
        "{} value={} {}",
        escape_measurement(&point.name),
        encode_field_value(&point.value),
        precision.from_epoch_ms(point.ts_ms)
    )
}

fn encode_field_value(value: &MeasurementValue) -> String {
    match value {
        MeasurementValue::I64(v) => format!("{}i", v),
        MeasurementValue::F64(v) => format!("{}", v),
        MeasurementValue::String(v) => {
            let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\"", escaped)
        }
    }
}

fn escape_measurement(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        if matches!(ch, ',' | ' ') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
