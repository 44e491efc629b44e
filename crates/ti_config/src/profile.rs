// crates/ti_config/src/profile.rs

//! 入流剖面描述
//!
//! 当宿主不提供平均速度、雷诺应力和长度尺度场时，可按剖面计算：
//!
//! ```text
//! uniform:      φ = φ_ref
//! exponential:  φ = φ_ref · |d / d_ref|^α
//! linear:       φ = φ_ref · (α (d / d_ref − 1) + 1)
//! ```
//!
//! 其中 `d` 为面中心沿参考方向 `(0, sin θ, cos θ)`（局部坐标）到原点的距离，
//! 原点为边界包围盒最小角加 `offset`。

use serde::{Deserialize, Serialize};
use ti_foundation::SymmTensor;

use crate::error::ConfigError;

/// 剖面类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// 均匀
    #[default]
    Uniform,
    /// 幂律
    Exponential,
    /// 线性
    Linear,
}

/// 标量剖面（平均速度、长度尺度）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarProfile {
    /// 剖面类型
    #[serde(default)]
    pub profile: ProfileKind,
    /// 参考值
    pub reference_value: f64,
    /// 参考方向角 [度]
    #[serde(default)]
    pub reference_angle: f64,
    /// 参考距离 [m]
    #[serde(default = "default_reference_dist")]
    pub reference_dist: f64,
    /// 指数 / 斜率
    #[serde(default)]
    pub alpha: f64,
}

/// 张量剖面（雷诺应力，按特征分量施加）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorProfile {
    /// 剖面类型
    #[serde(default)]
    pub profile: ProfileKind,
    /// 参考值
    pub reference_value: SymmTensor,
    /// 参考方向角 [度]
    #[serde(default)]
    pub reference_angle: f64,
    /// 参考距离 [m]
    #[serde(default = "default_reference_dist")]
    pub reference_dist: f64,
    /// 每个特征分量的指数 / 斜率
    #[serde(default)]
    pub alpha: [f64; 3],
}

fn default_reference_dist() -> f64 {
    1.0
}

impl ScalarProfile {
    /// 均匀剖面
    pub fn uniform(value: f64) -> Self {
        Self {
            profile: ProfileKind::Uniform,
            reference_value: value,
            reference_angle: 0.0,
            reference_dist: default_reference_dist(),
            alpha: 0.0,
        }
    }

    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if !(self.reference_dist > 0.0) {
            return Err(ConfigError::invalid(
                format!("{key}.reference_dist"),
                self.reference_dist,
                "参考距离必须为正",
            ));
        }
        if !self.reference_value.is_finite() {
            return Err(ConfigError::invalid(
                format!("{key}.reference_value"),
                self.reference_value,
                "必须有限",
            ));
        }
        Ok(())
    }
}

impl TensorProfile {
    /// 均匀剖面
    pub fn uniform(value: SymmTensor) -> Self {
        Self {
            profile: ProfileKind::Uniform,
            reference_value: value,
            reference_angle: 0.0,
            reference_dist: default_reference_dist(),
            alpha: [0.0; 3],
        }
    }

    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if !(self.reference_dist > 0.0) {
            return Err(ConfigError::invalid(
                format!("{key}.reference_dist"),
                self.reference_dist,
                "参考距离必须为正",
            ));
        }
        if !self.reference_value.is_finite() {
            return Err(ConfigError::invalid(
                format!("{key}.reference_value"),
                format!("{:?}", self.reference_value),
                "必须有限",
            ));
        }
        Ok(())
    }
}

/// 入流属性（`inflowProperties` 字典）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InflowProperties {
    /// 剖面原点相对包围盒最小角的偏移（局部坐标）
    #[serde(default)]
    pub offset: [f64; 3],
    /// 平均法向速度
    #[serde(rename = "U")]
    pub u: ScalarProfile,
    /// 雷诺应力
    #[serde(rename = "R")]
    pub r: TensorProfile,
    /// 积分长度尺度
    #[serde(rename = "L")]
    pub l: ScalarProfile,
}

impl InflowProperties {
    /// 校验三个剖面
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.u.validate("inflow.U")?;
        self.r.validate("inflow.R")?;
        self.l.validate("inflow.L")?;
        if self.l.profile == ProfileKind::Uniform && !(self.l.reference_value > 0.0) {
            return Err(ConfigError::invalid(
                "inflow.L.reference_value",
                self.l.reference_value,
                "长度尺度必须为正",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inflow_properties() {
        let json = r#"{
            "U": { "profile": "exponential", "reference_value": 10.0, "reference_dist": 0.5, "alpha": 0.14 },
            "R": { "reference_value": { "xx": 1.0, "xy": 0.0, "xz": 0.0, "yy": 0.5, "yz": 0.0, "zz": 0.5 } },
            "L": { "reference_value": 0.2 }
        }"#;
        let props: InflowProperties = serde_json::from_str(json).unwrap();
        assert_eq!(props.u.profile, ProfileKind::Exponential);
        assert_eq!(props.r.profile, ProfileKind::Uniform);
        assert!(props.validate().is_ok());
    }

    #[test]
    fn test_reference_dist_must_be_positive() {
        let mut p = ScalarProfile::uniform(1.0);
        p.reference_dist = 0.0;
        let err = p.validate("inflow.U").unwrap_err();
        assert!(err.to_string().contains("inflow.U.reference_dist"));
    }

    #[test]
    fn test_negative_length_scale_rejected() {
        let props = InflowProperties {
            offset: [0.0; 3],
            u: ScalarProfile::uniform(1.0),
            r: TensorProfile::uniform(SymmTensor::isotropic(0.1)),
            l: ScalarProfile::uniform(-0.1),
        };
        assert!(props.validate().is_err());
    }
}
