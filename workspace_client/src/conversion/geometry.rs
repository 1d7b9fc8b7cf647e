// workspace_client/src/conversion/geometry.rs

//! 几何条件解析。
//!
//! 两类几何：
//! - `45_0` 方向性几何：由光源与滤光片组合决定 ISO 13655 测量条件 (M0–M3)，只接受四种已知组合；
//! - 多角度几何：名称在去掉一个前导 `r` 后与固定表精确匹配，例如 `r45as25` 与 `45as25` 等价。
//!
//! 表外的名称与组合一律视为错误。

use common_models::measurement::{
    Illumination, MeasurementFilter, MeasurementMode, MultiAngleGeometry,
};

/// 45°/0° 方向性几何的名称。
pub const DIRECTIONAL_45_0: &str = "45_0";

/// (名称, 入射角, 偏镜面角, 方位角)
const MULTI_ANGLE_GEOMETRIES: [(&str, i16, i16, Option<i16>); 20] = [
    ("45as-15", 45, -15, None),
    ("45as15", 45, 15, None),
    ("45as25", 45, 25, None),
    ("45as45", 45, 45, None),
    ("45as75", 45, 75, None),
    ("45as110", 45, 110, None),
    ("15as-45", 15, -45, None),
    ("15as-15", 15, -15, None),
    ("15as15", 15, 15, None),
    ("15as45", 15, 45, None),
    ("15as80", 15, 80, None),
    ("25as-15", 25, -15, None),
    ("25as15", 25, 15, None),
    ("25as45", 25, 45, None),
    ("25as75", 25, 75, None),
    ("25as95", 25, 95, None),
    ("45as25az90", 45, 25, Some(90)),
    ("45as25az-90", 45, 25, Some(-90)),
    ("45as-15az90", 45, -15, Some(90)),
    ("45as-15az-90", 45, -15, Some(-90)),
];

/// (光源, 滤光片, 解析结果)
const DIRECTIONAL_COMBINATIONS: [(&str, &str, Illumination, MeasurementFilter, MeasurementMode); 4] = [
    ("A", "none", Illumination::A, MeasurementFilter::None, MeasurementMode::M0),
    ("D50", "none", Illumination::D50, MeasurementFilter::None, MeasurementMode::M1),
    ("D65", "uvcut", Illumination::D65, MeasurementFilter::UvCut, MeasurementMode::M2),
    ("D50", "polarized", Illumination::D50, MeasurementFilter::Polarized, MeasurementMode::M3),
];

/// 去掉至多一个前导 `r`。
pub fn normalize_geometry_name(name: &str) -> &str {
    name.strip_prefix('r').unwrap_or(name)
}

/// 按名称解析多角度几何。未知名称返回 `None`。
pub fn resolve_multi_angle(name: &str) -> Option<MultiAngleGeometry> {
    let key = normalize_geometry_name(name);
    MULTI_ANGLE_GEOMETRIES
        .iter()
        .find(|(known, ..)| *known == key)
        .map(|(known, incidence, aspecular, azimuth)| MultiAngleGeometry {
            key: (*known).to_string(),
            incidence_angle: *incidence,
            aspecular_angle: *aspecular,
            azimuth_angle: *azimuth,
        })
}

/// 解析 45/0 几何的光源与滤光片组合。缺省滤光片按 `none` 处理。
pub fn resolve_directional(
    illumination: Option<&str>,
    filter: Option<&str>,
) -> Option<(Illumination, MeasurementFilter, MeasurementMode)> {
    let illumination = illumination?;
    let filter = filter.unwrap_or("none");
    DIRECTIONAL_COMBINATIONS
        .iter()
        .find(|(known_illumination, known_filter, ..)| *known_illumination == illumination && *known_filter == filter)
        .map(|(_, _, illumination, filter, mode)| (*illumination, *filter, *mode))
}

/// 多角度几何上附带的光源代码，未知代码返回 `None`。
pub fn parse_illumination(code: &str) -> Option<Illumination> {
    match code {
        "A" => Some(Illumination::A),
        "D50" => Some(Illumination::D50),
        "D65" => Some(Illumination::D65),
        _ => None,
    }
}

pub fn parse_filter(code: &str) -> Option<MeasurementFilter> {
    match code {
        "none" => Some(MeasurementFilter::None),
        "uvcut" => Some(MeasurementFilter::UvCut),
        "polarized" => Some(MeasurementFilter::Polarized),
        _ => None,
    }
}

/// 所有已知多角度几何名称。
pub fn known_multi_angle_names() -> impl Iterator<Item = &'static str> {
    MULTI_ANGLE_GEOMETRIES.iter().map(|(name, ..)| *name)
}
