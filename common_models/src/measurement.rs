//! 测量数据模型。
//!
//! 分为两部分：
//! - **设备上报载荷** (`DeviceMeasurementPayload` 及其子结构)：按设备/服务端的 JSON 形状原样反序列化，
//!   所有字段均为 `Option`，以便转换管线能给出带点分路径的缺失字段错误，而不是笼统的 serde 错误。
//! - **规范化模型** (`Measurement`, `MeasurementSample` 等)：转换管线的输出，构造后不可变。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// --- 设备上报载荷 ---

/// 设备上报的测量载荷根对象。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMeasurementPayload {
    pub measurement_data: Option<MeasurementData>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementData {
    pub device: Option<DeviceInfo>,
    pub measurement_set: Option<RawMeasurementSet>,
}

/// 设备信息。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
}

/// 一次测量会话：包含一条或多条原始测量。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawMeasurementSet {
    pub id: Option<String>,
    /// Unix 纪元秒。
    pub timestamp: Option<i64>,
    pub measurements: Option<Vec<RawMeasurement>>,
}

/// 单条原始测量。`color_values` 的键是变换模式 (例如 `ma9x`)，值是该模式下的各几何条件颜色值。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawMeasurement {
    #[serde(default)]
    pub color_values: BTreeMap<String, Vec<RawColorValue>>,
}

/// 某一变换模式、某一几何条件下的颜色值，携带光谱数据或 Lab 数据。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawColorValue {
    pub geometry: Option<String>,
    pub illumination: Option<String>,
    pub filter: Option<String>,
    pub spectral: Option<RawSpectralData>,
    pub lab: Option<RawLabData>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawSpectralData {
    pub wavelength_start: Option<f64>,
    pub wavelength_interval: Option<f64>,
    pub values: Option<SpectralValues>,
}

/// 光谱采样值：要么已是数值数组，要么是小端 32 位浮点数组的 Base64 编码。
///
/// 数值数组按 JSON 的双精度原样保留，不做 32 位截断。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SpectralValues {
    Samples(Vec<f64>),
    Encoded(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawLabData {
    #[serde(rename = "L", alias = "l")]
    pub l: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
}

// --- 规范化模型 ---

/// 仪器记录。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: Option<String>,
}

/// 设备校准变换类型，严格由原始载荷中的模式键派生。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransformationType {
    Ma9x,
    Mat,
    Byk,
    Din6175,
    Astm,
}

impl TransformationType {
    pub const ALL: [TransformationType; 5] = [
        TransformationType::Ma9x,
        TransformationType::Mat,
        TransformationType::Byk,
        TransformationType::Din6175,
        TransformationType::Astm,
    ];

    /// 原始载荷中使用的模式键。
    pub fn mode_key(&self) -> &'static str {
        match self {
            TransformationType::Ma9x => "ma9x",
            TransformationType::Mat => "mat",
            TransformationType::Byk => "byk",
            TransformationType::Din6175 => "din6175",
            TransformationType::Astm => "astm",
        }
    }

    /// 精确匹配模式键，未知键返回 `None`。
    pub fn from_mode_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.mode_key() == key)
    }
}

/// 光源。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Illumination {
    A,
    D50,
    D65,
}

/// 测量滤光片。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementFilter {
    None,
    UvCut,
    Polarized,
}

/// ISO 13655 测量条件 M0–M3 (仅 45°/0° 几何使用)。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementMode {
    M0,
    M1,
    M2,
    M3,
}

/// 多角度几何：入射角、相对镜面反射方向的偏角 (aspecular) 以及可选的方位角。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct MultiAngleGeometry {
    /// 规范化后的几何名称 (不含前缀 `r`)，例如 `45as25`。
    pub key: String,
    pub incidence_angle: i16,
    pub aspecular_angle: i16,
    pub azimuth_angle: Option<i16>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Geometry {
    /// 45°/0° 方向性几何。
    Directional45x0,
    MultiAngle(MultiAngleGeometry),
}

/// 测量条件：几何 + 光源/滤光片 + 变换类型。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementCondition {
    pub geometry: Geometry,
    pub illumination: Option<Illumination>,
    pub filter: Option<MeasurementFilter>,
    pub measurement_mode: Option<MeasurementMode>,
    pub transformation: TransformationType,
}

/// 光谱采样窗口。`end_wavelength = start_wavelength + (sample_count - 1) * interval`。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpectralSampling {
    pub start_wavelength: f64,
    pub end_wavelength: f64,
    pub interval: f64,
    pub sample_count: usize,
}

impl SpectralSampling {
    /// 由起始波长、间隔和采样数构建窗口。`sample_count` 为 0 时结束波长等于起始波长。
    pub fn from_start_interval_count(start: f64, interval: f64, sample_count: usize) -> Self {
        let steps = sample_count.saturating_sub(1) as f64;
        Self {
            start_wavelength: start,
            end_wavelength: start + steps * interval,
            interval,
            sample_count,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[non_exhaustive]
pub enum ColorSpecification {
    Spectral(SpectralSampling),
}

/// 规范化的测量样本。构造后不可变。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementSample {
    pub measurement_condition: MeasurementCondition,
    pub color_specification: ColorSpecification,
    /// 采样值。Base64 来源的 32 位浮点数无损扩展为 `f64`。
    pub data: Vec<f64>,
}

/// 规范化的测量。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: Uuid,
    pub creation_time: DateTime<Utc>,
    pub instrument: Instrument,
    pub measurement_samples: Vec<MeasurementSample>,
}
