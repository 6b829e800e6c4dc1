use std::collections::BTreeMap;
use std::fmt;

/// 无线接收器产出的原始帧（尚未解码）。
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// 发送方设备标识（如 `01:80:F5:BC`）。
    pub sender: String,
    /// 报文族（EnOcean RORG，4BS 为 0xA5）。
    pub rorg: u8,
    pub payload: Vec<u8>,
    pub received_at_ms: i64,
}

/// 解码后的原始值。
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Numeric(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Numeric(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

/// 单个解码字段：值 + 可选单位。
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub value: RawValue,
    pub unit: Option<String>,
}

/// 一次事件的解码结果：原始字段名 -> 原始值。
///
/// 只在一次流水线处理内存活。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReading {
    fields: BTreeMap<String, RawField>,
}

impl RawReading {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加字段（无单位）。
    pub fn with(mut self, field: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(field, value.into(), None);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: RawValue, unit: Option<String>) {
        self.fields.insert(field.into(), RawField { value, unit });
    }

    pub fn get(&self, field: &str) -> Option<&RawField> {
        self.fields.get(field)
    }

    pub fn value(&self, field: &str) -> Option<&RawValue> {
        self.fields.get(field).map(|item| &item.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawField)> {
        self.fields.iter()
    }
}

/// 测量值的数据类型。
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementValue {
    I64(i64),
    F64(f64),
    String(String),
}

impl MeasurementValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MeasurementValue::I64(v) => Some(*v as f64),
            MeasurementValue::F64(v) => Some(*v),
            MeasurementValue::String(_) => None,
        }
    }
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementValue::I64(v) => write!(f, "{}", v),
            MeasurementValue::F64(v) => write!(f, "{}", v),
            MeasurementValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// 规范化后的测量值（时序库中的一个点）。
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// 序列名，对应唯一的 `SensorMapping.output_name`。
    pub name: String,
    pub value: MeasurementValue,
    pub ts_ms: i64,
}

/// 同一事件产出的测量值批次，作为一次写请求提交。
#[derive(Debug, Clone, PartialEq)]
pub struct PublishBatch {
    source: String,
    ts_ms: i64,
    measurements: Vec<Measurement>,
}

impl PublishBatch {
    /// 以 `ts_ms` 统一批次内所有测量值的时间戳。
    pub fn new(source: impl Into<String>, ts_ms: i64, measurements: Vec<Measurement>) -> Self {
        let measurements = measurements
            .into_iter()
            .map(|mut item| {
                item.ts_ms = ts_ms;
                item
            })
            .collect();
        Self {
            source: source.into(),
            ts_ms,
            measurements,
        }
    }

    /// 由 normalize 输出构造；时间戳取首个测量值。
    pub fn from_measurements(source: impl Into<String>, measurements: Vec<Measurement>) -> Self {
        let ts_ms = measurements.first().map(|item| item.ts_ms).unwrap_or_default();
        Self::new(source, ts_ms, measurements)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ts_ms(&self) -> i64 {
        self.ts_ms
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}
