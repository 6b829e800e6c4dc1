pub mod data;
pub mod device;

pub use data::{
    Measurement, MeasurementValue, PublishBatch, RawField, RawFrame, RawReading, RawValue,
};
pub use device::{BinaryOutput, DecodeProfile, DeviceEntry, SensorKind, SensorMapping};

/// 当前 Unix 时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
