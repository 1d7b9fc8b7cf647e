// workspace_client/src/conversion/pipeline.rs

//! 转换管线：校验设备载荷并展开为规范化的测量样本。

use chrono::{DateTime, Utc};
use common_models::measurement::{
    ColorSpecification, DeviceMeasurementPayload, Geometry, Instrument, Measurement, MeasurementCondition,
    MeasurementSample, RawColorValue, SpectralSampling, SpectralValues, TransformationType,
};
use log::{debug, info};
use uuid::Uuid;

use super::codec::decode_f32_base64;
use super::geometry::{self, DIRECTIONAL_45_0};
use crate::error::ConversionError;

/// 仪器制造商固定为 X-Rite。
pub const INSTRUMENT_MANUFACTURER: &str = "X-Rite";

const SET_PATH: &str = "measurementData.measurementSet";

/// 将设备载荷转换为规范化测量。
///
/// 必填字段缺失时立即失败并给出点分路径。只有 Lab 数据的颜色值被跳过。
pub fn convert(payload: &DeviceMeasurementPayload) -> Result<Measurement, ConversionError> {
    let data = payload
        .measurement_data
        .as_ref()
        .ok_or_else(|| ConversionError::missing("measurementData"))?;
    let device = data
        .device
        .as_ref()
        .ok_or_else(|| ConversionError::missing("measurementData.device"))?;
    let set = data
        .measurement_set
        .as_ref()
        .ok_or_else(|| ConversionError::missing(SET_PATH))?;
    let set_id = set
        .id
        .as_deref()
        .ok_or_else(|| ConversionError::missing(format!("{}.id", SET_PATH)))?;
    let timestamp = set
        .timestamp
        .ok_or_else(|| ConversionError::missing(format!("{}.timestamp", SET_PATH)))?;
    let measurements = set
        .measurements
        .as_ref()
        .ok_or_else(|| ConversionError::missing(format!("{}.measurements", SET_PATH)))?;

    let instrument = Instrument {
        manufacturer: INSTRUMENT_MANUFACTURER.to_string(),
        model: device
            .model
            .clone()
            .ok_or_else(|| ConversionError::missing("measurementData.device.model"))?,
        serial_number: device
            .serial_number
            .clone()
            .ok_or_else(|| ConversionError::missing("measurementData.device.serialNumber"))?,
        firmware_version: device.firmware_version.clone(),
    };

    let creation_time = DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| {
        ConversionError::InvalidTimestamp {
            path: format!("{}.timestamp", SET_PATH),
            timestamp,
        }
    })?;

    let mut measurement_samples = Vec::new();
    for (measurement_index, measurement) in measurements.iter().enumerate() {
        for (mode, color_values) in &measurement.color_values {
            let mode_path = format!("{}.measurements[{}].colorValues.{}", SET_PATH, measurement_index, mode);
            let transformation = TransformationType::from_mode_key(mode).ok_or_else(|| {
                ConversionError::UnknownTransformationMode {
                    path: mode_path.clone(),
                    mode: mode.clone(),
                }
            })?;
            for (value_index, color_value) in color_values.iter().enumerate() {
                let value_path = format!("{}[{}]", mode_path, value_index);
                if let Some(sample) = convert_color_value(color_value, transformation, &value_path)? {
                    measurement_samples.push(sample);
                }
            }
        }
    }

    info!(
        "[转换管线] 测量集 {} 转换完成: {} 条测量, {} 个样本",
        set_id,
        measurements.len(),
        measurement_samples.len()
    );

    Ok(Measurement {
        id: Uuid::new_v4(),
        creation_time,
        instrument,
        measurement_samples,
    })
}

/// 转换单个颜色值。只有 Lab 数据时返回 `Ok(None)`。
fn convert_color_value(
    value: &RawColorValue,
    transformation: TransformationType,
    path: &str,
) -> Result<Option<MeasurementSample>, ConversionError> {
    let Some(spectral) = value.spectral.as_ref() else {
        if value.lab.is_some() {
            debug!("[转换管线] 跳过仅含 Lab 数据的颜色值: {}", path);
            return Ok(None);
        }
        return Err(ConversionError::missing(format!("{}.spectral", path)));
    };

    let values_path = format!("{}.spectral.values", path);
    let data = match spectral.values.as_ref() {
        Some(SpectralValues::Samples(samples)) => samples.clone(),
        Some(SpectralValues::Encoded(encoded)) => {
            decode_f32_base64(encoded)
                .map_err(|e| ConversionError::InvalidEncoding {
                    path: values_path.clone(),
                    reason: e.to_string(),
                })?
                .into_iter()
                .map(f64::from)
                .collect()
        }
        None => return Err(ConversionError::missing(values_path)),
    };
    if data.is_empty() {
        return Err(ConversionError::EmptySpectrum { path: values_path });
    }

    let start = spectral
        .wavelength_start
        .ok_or_else(|| ConversionError::missing(format!("{}.spectral.wavelengthStart", path)))?;
    let interval = spectral
        .wavelength_interval
        .ok_or_else(|| ConversionError::missing(format!("{}.spectral.wavelengthInterval", path)))?;

    let measurement_condition = resolve_condition(value, transformation, path)?;
    let color_specification =
        ColorSpecification::Spectral(SpectralSampling::from_start_interval_count(start, interval, data.len()));

    Ok(Some(MeasurementSample {
        measurement_condition,
        color_specification,
        data,
    }))
}

fn resolve_condition(
    value: &RawColorValue,
    transformation: TransformationType,
    path: &str,
) -> Result<MeasurementCondition, ConversionError> {
    let geometry_path = format!("{}.geometry", path);
    let name = value
        .geometry
        .as_deref()
        .ok_or_else(|| ConversionError::missing(geometry_path.clone()))?;

    if name == DIRECTIONAL_45_0 {
        let (illumination, filter, mode) =
            geometry::resolve_directional(value.illumination.as_deref(), value.filter.as_deref()).ok_or_else(|| {
                ConversionError::UnsupportedIlluminationFilter {
                    path: geometry_path.clone(),
                    illumination: value.illumination.clone(),
                    filter: value.filter.clone(),
                }
            })?;
        return Ok(MeasurementCondition {
            geometry: Geometry::Directional45x0,
            illumination: Some(illumination),
            filter: Some(filter),
            measurement_mode: Some(mode),
            transformation,
        });
    }

    let multi_angle = geometry::resolve_multi_angle(name).ok_or_else(|| ConversionError::UnknownGeometry {
        path: geometry_path,
        geometry: name.to_string(),
    })?;
    Ok(MeasurementCondition {
        geometry: Geometry::MultiAngle(multi_angle),
        illumination: value.illumination.as_deref().and_then(geometry::parse_illumination),
        filter: value.filter.as_deref().and_then(geometry::parse_filter),
        measurement_mode: None,
        transformation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::codec::encode_f32_base64;
    use common_models::measurement::{Illumination, MeasurementMode};
    use serde_json::{json, Value};

    fn payload(color_values: Value) -> DeviceMeasurementPayload {
        serde_json::from_value(json!({
            "measurementData": {
                "device": { "model": "MA-T12", "serialNumber": "SN-001", "firmwareVersion": "2.1" },
                "measurementSet": {
                    "id": "set-1",
                    "timestamp": 1_700_000_000,
                    "measurements": [{ "colorValues": color_values }]
                }
            }
        }))
        .expect("构造测试载荷失败")
    }

    fn spectral(start: f64, interval: f64, values: &[f32]) -> Value {
        json!({ "wavelengthStart": start, "wavelengthInterval": interval, "values": encode_f32_base64(values) })
    }

    #[test]
    /// 31 个采样点、400nm 起、间隔 10nm：结束波长 700nm，数据逐位保持。
    fn test_convert_multi_angle_sample() {
        let values: Vec<f32> = (0..31).map(|i| i as f32 / 31.0).collect();
        let measurement = convert(&payload(json!({
            "ma9x": [{ "geometry": "r45as25", "spectral": spectral(400.0, 10.0, &values) }]
        })))
        .expect("转换失败");

        assert_eq!(measurement.instrument.manufacturer, "X-Rite");
        assert_eq!(measurement.instrument.serial_number, "SN-001");
        assert_eq!(measurement.creation_time.timestamp(), 1_700_000_000);
        assert_eq!(measurement.measurement_samples.len(), 1);

        let sample = &measurement.measurement_samples[0];
        assert_eq!(sample.data, values.iter().map(|v| f64::from(*v)).collect::<Vec<f64>>());
        assert_eq!(sample.measurement_condition.transformation, TransformationType::Ma9x);
        match &sample.measurement_condition.geometry {
            Geometry::MultiAngle(g) => assert_eq!(g.key, "45as25"),
            other => panic!("预期多角度几何，实际为: {:?}", other),
        }
        match &sample.color_specification {
            ColorSpecification::Spectral(sampling) => assert_eq!(sampling.end_wavelength, 700.0),
            other => panic!("预期光谱规格，实际为: {:?}", other),
        }
    }

    #[test]
    fn test_convert_directional_sample_and_numeric_values() {
        let measurement = convert(&payload(json!({
            "astm": [{
                "geometry": "45_0",
                "illumination": "D65",
                "filter": "uvcut",
                "spectral": { "wavelengthStart": 400, "wavelengthInterval": 20, "values": [0.1, 0.2, 0.3] }
            }]
        })))
        .expect("转换失败");
        let condition = &measurement.measurement_samples[0].measurement_condition;
        assert_eq!(condition.geometry, Geometry::Directional45x0);
        assert_eq!(condition.illumination, Some(Illumination::D65));
        assert_eq!(condition.measurement_mode, Some(MeasurementMode::M2));
        assert_eq!(condition.transformation, TransformationType::Astm);
        assert_eq!(measurement.measurement_samples[0].data, vec![0.1, 0.2, 0.3], "数值数组应原样保留");
    }

    #[test]
    /// 只有 Lab 数据的条目被跳过，其余条目正常转换。
    fn test_lab_only_entries_are_skipped() {
        let measurement = convert(&payload(json!({
            "mat": [
                { "geometry": "45as45", "lab": { "L": 50.0, "a": 1.0, "b": 2.0 } },
                { "geometry": "45as45", "spectral": spectral(400.0, 10.0, &[0.5, 0.6]) }
            ]
        })))
        .expect("转换失败");
        assert_eq!(measurement.measurement_samples.len(), 1);
    }

    #[test]
    /// 未知几何报错，错误中带有完整的字段路径。
    fn test_unknown_geometry_names_the_path() {
        let error = convert(&payload(json!({
            "ma9x": [
                { "geometry": "45as15", "spectral": spectral(400.0, 10.0, &[0.5]) },
                { "geometry": "unknown-geo", "spectral": spectral(400.0, 10.0, &[0.5]) }
            ]
        })))
        .expect_err("未知几何应报错");
        assert_eq!(
            error,
            ConversionError::UnknownGeometry {
                path: "measurementData.measurementSet.measurements[0].colorValues.ma9x[1].geometry".to_string(),
                geometry: "unknown-geo".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_mode_and_unsupported_combination() {
        let error = convert(&payload(json!({ "xrite": [] }))).expect_err("未知模式应报错");
        assert!(matches!(error, ConversionError::UnknownTransformationMode { ref mode, .. } if mode == "xrite"));

        let error = convert(&payload(json!({
            "byk": [{ "geometry": "45_0", "illumination": "A", "filter": "uvcut", "spectral": spectral(400.0, 10.0, &[0.1]) }]
        })))
        .expect_err("未知组合应报错");
        assert!(matches!(error, ConversionError::UnsupportedIlluminationFilter { .. }));
        assert!(error.path().ends_with("byk[0].geometry"));
    }

    #[test]
    /// 缺少必填字段时按校验顺序报告第一个缺失字段。
    fn test_missing_required_fields() {
        let no_device: DeviceMeasurementPayload =
            serde_json::from_value(json!({ "measurementData": { "measurementSet": {} } })).unwrap();
        assert_eq!(convert(&no_device).unwrap_err().path(), "measurementData.device");

        let no_timestamp: DeviceMeasurementPayload = serde_json::from_value(json!({
            "measurementData": { "device": { "model": "m", "serialNumber": "s" }, "measurementSet": { "id": "x", "measurements": [] } }
        }))
        .unwrap();
        assert_eq!(convert(&no_timestamp).unwrap_err().path(), "measurementData.measurementSet.timestamp");

        assert_eq!(convert(&DeviceMeasurementPayload::default()).unwrap_err().path(), "measurementData");
    }

    #[test]
    fn test_bad_encoding_and_empty_spectrum() {
        let error = convert(&payload(json!({
            "ma9x": [{ "geometry": "45as15", "spectral": { "wavelengthStart": 400, "wavelengthInterval": 10, "values": "AAAA" } }]
        })))
        .unwrap_err();
        assert!(matches!(error, ConversionError::InvalidEncoding { .. }));
        assert!(error.path().ends_with("ma9x[0].spectral.values"));

        let error = convert(&payload(json!({
            "ma9x": [{ "geometry": "45as15", "spectral": { "wavelengthStart": 400, "wavelengthInterval": 10, "values": [] } }]
        })))
        .unwrap_err();
        assert!(matches!(error, ConversionError::EmptySpectrum { .. }));
    }

    #[test]
    fn test_each_conversion_gets_a_fresh_id() {
        let input = payload(json!({ "ma9x": [] }));
        let first = convert(&input).unwrap();
        let second = convert(&input).unwrap();
        assert_ne!(first.id, second.id);
        assert!(first.measurement_samples.is_empty());
    }
}
