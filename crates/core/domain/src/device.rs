use serde::{Deserialize, Serialize};

/// 外部解码器解释原始帧所需的参数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "codec", rename_all = "snake_case")]
pub enum DecodeProfile {
    /// EnOcean 设备描述（RORG / FUNC / TYPE）。
    Eep {
        rorg: u8,
        func: u8,
        #[serde(rename = "type")]
        type_code: u8,
    },
    /// 轮询型数据源，读数已是字段表，无需解码。
    Passthrough,
}

/// 占用类传感器的输出形式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOutput {
    /// `1` / `0`
    #[default]
    Numeric,
    /// `"occupied"` / `"empty"`
    Labeled,
}

/// 传感器类型，决定文本值的映射方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    #[default]
    Numeric,
    Text,
    Occupancy(BinaryOutput),
}

/// 原始字段到输出序列名的映射。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMapping {
    pub raw_field: String,
    pub output_name: String,
    #[serde(default)]
    pub kind: SensorKind,
    /// 单位换算：先乘 `scale` 再加 `offset`，在四舍五入之前执行。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

impl SensorMapping {
    pub fn numeric(raw_field: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            raw_field: raw_field.into(),
            output_name: output_name.into(),
            kind: SensorKind::Numeric,
            scale: None,
            offset: None,
        }
    }

    pub fn occupancy(
        raw_field: impl Into<String>,
        output_name: impl Into<String>,
        output: BinaryOutput,
    ) -> Self {
        Self {
            kind: SensorKind::Occupancy(output),
            ..Self::numeric(raw_field, output_name)
        }
    }

    pub fn text(raw_field: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            kind: SensorKind::Text,
            ..Self::numeric(raw_field, output_name)
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// 单个设备的静态配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub identity: String,
    pub profile: DecodeProfile,
    pub sensors: Vec<SensorMapping>,
}

impl DeviceEntry {
    pub fn new(
        identity: impl Into<String>,
        profile: DecodeProfile,
        sensors: Vec<SensorMapping>,
    ) -> Self {
        Self {
            identity: identity.into(),
            profile,
            sensors,
        }
    }
}
