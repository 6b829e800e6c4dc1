use domain::{
    BinaryOutput, DeviceEntry, Measurement, MeasurementValue, RawReading, RawValue, SensorKind,
    SensorMapping,
};
use tracing::warn;

/// 数值保留的小数位数。
pub const DECIMAL_PLACES: i32 = 2;

pub const OCCUPIED_LABEL: &str = "occupied";
pub const EMPTY_LABEL: &str = "empty";

/// 解码读数 -> 规范化测量值。
///
/// 设备声明的每个传感器映射至多产出一个测量值，全部使用 `now_ms` 作为时间戳；
/// 读数中缺失的字段直接跳过。返回空向量表示本次事件无需发布。
pub fn normalize(entry: &DeviceEntry, raw: &RawReading, now_ms: i64) -> Vec<Measurement> {
    entry
        .sensors
        .iter()
        .filter_map(|mapping| {
            let value = raw.value(&mapping.raw_field)?;
            let value = normalize_value(mapping, value);
            if value.is_none() {
                warn!(
                    target: "homepoll.normalize",
                    source = %entry.identity,
                    field = %mapping.raw_field,
                    "non_finite_value_skipped"
                );
            }
            Some(Measurement {
                name: mapping.output_name.clone(),
                value: value?,
                ts_ms: now_ms,
            })
        })
        .collect()
}

/// 单个原始值的类型转换；非有限数值返回 `None`。
pub fn normalize_value(mapping: &SensorMapping, value: &RawValue) -> Option<MeasurementValue> {
    if let SensorKind::Occupancy(output) = mapping.kind {
        return Some(occupancy_value(output, is_occupied(value)));
    }
    match value {
        RawValue::Numeric(v) => {
            let rounded = round_value(convert_unit(mapping, *v));
            if !rounded.is_finite() {
                return None;
            }
            Some(MeasurementValue::F64(rounded))
        }
        RawValue::Text(token) => Some(MeasurementValue::String(token.clone())),
    }
}

/// 按映射声明换算单位：先 `scale` 后 `offset`。
fn convert_unit(mapping: &SensorMapping, value: f64) -> f64 {
    let mut value = value;
    if let Some(scale) = mapping.scale {
        value *= scale;
    }
    if let Some(offset) = mapping.offset {
        value += offset;
    }
    value
}

/// 四舍五入到 [`DECIMAL_PLACES`] 位小数。
///
/// 放大后溢出的极大值已没有小数部分，原样返回。
pub fn round_value(value: f64) -> f64 {
    let factor = 10f64.powi(DECIMAL_PLACES);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// `"on"`（或 `"true"`）为占用，其余任何文本均为空闲；数值非零为占用。
pub fn is_occupied(value: &RawValue) -> bool {
    match value {
        RawValue::Text(token) => {
            let token = token.trim();
            token.eq_ignore_ascii_case("on") || token.eq_ignore_ascii_case("true")
        }
        RawValue::Numeric(v) => *v != 0.0,
    }
}

fn occupancy_value(output: BinaryOutput, occupied: bool) -> MeasurementValue {
    match (output, occupied) {
        (BinaryOutput::Numeric, true) => MeasurementValue::I64(1),
        (BinaryOutput::Numeric, false) => MeasurementValue::I64(0),
        (BinaryOutput::Labeled, true) => MeasurementValue::String(OCCUPIED_LABEL.to_string()),
        (BinaryOutput::Labeled, false) => MeasurementValue::String(EMPTY_LABEL.to_string()),
    }
}
