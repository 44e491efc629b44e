// crates/ti_inflow/src/profile.rs

//! 由剖面描述计算入流统计场
//!
//! 距离 `d` 为面中心（局部坐标）相对原点沿参考方向 `(0, sin θ, cos θ)`
//! 的投影，原点为全局横向包围盒的下角加 `offset`。
//!
//! 雷诺应力剖面按特征分量施加：
//!
//! ```text
//! R(d) = Σ_i p_i(d) λ_i a_i a_iᵀ
//! ```
//!
//! 其中 `(λ_i, a_i)` 为参考张量与坐标轴 i 对齐的特征对，`p_i` 用第 i 个 `α`。

use glam::DVec3;
use ti_config::{InflowProperties, ProfileKind, ScalarProfile, TensorProfile};
use ti_foundation::{SymmTensor, TiError, TiResult};

use crate::fields::{InletFields, LengthScaleField};
use crate::numerics::eigen::{eigen_decompose, Eigen3};
use crate::patch::PatchGeometry;

/// 剖面求值器
#[derive(Debug, Clone)]
pub struct ProfileSpec {
    origin: DVec3,
    positions: Vec<DVec3>,
}

impl ProfileSpec {
    /// 以边界几何与原点偏移（局部坐标）构造
    pub fn new(geometry: &PatchGeometry, offset: [f64; 3]) -> Self {
        let min = geometry.global_bounds().min;
        let origin = DVec3::new(0.0, min.x, min.y) + DVec3::from_array(offset);
        let positions = geometry
            .lateral()
            .iter()
            .map(|p| DVec3::new(0.0, p.x, p.y))
            .collect();
        Self { origin, positions }
    }

    /// 直接由局部坐标构造
    pub fn from_positions(origin: DVec3, positions: Vec<DVec3>) -> Self {
        Self { origin, positions }
    }

    fn scaled_distances(&self, angle_deg: f64, reference_dist: f64, key: &str) -> TiResult<Vec<f64>> {
        if !(reference_dist > 0.0) {
            return Err(TiError::config(
                format!("{key}.reference_dist"),
                format!("参考距离 {reference_dist} 必须为正"),
            ));
        }
        let theta = angle_deg.to_radians();
        let dir = DVec3::new(0.0, theta.sin(), theta.cos());
        Ok(self
            .positions
            .iter()
            .map(|p| dir.dot(*p - self.origin) / reference_dist)
            .collect())
    }

    /// 标量剖面
    pub fn evaluate_scalar(&self, spec: &ScalarProfile, key: &str) -> TiResult<Vec<f64>> {
        let v0 = spec.reference_value;
        match spec.profile {
            ProfileKind::Uniform => Ok(vec![v0; self.positions.len()]),
            ProfileKind::Exponential => Ok(self
                .scaled_distances(spec.reference_angle, spec.reference_dist, key)?
                .into_iter()
                .map(|d| v0 * d.abs().powf(spec.alpha))
                .collect()),
            ProfileKind::Linear => Ok(self
                .scaled_distances(spec.reference_angle, spec.reference_dist, key)?
                .into_iter()
                .map(|d| v0 * (spec.alpha * (d - 1.0) + 1.0))
                .collect()),
        }
    }

    /// 张量剖面
    pub fn evaluate_tensor(&self, spec: &TensorProfile, key: &str) -> TiResult<Vec<SymmTensor>> {
        let r0 = spec.reference_value;
        if spec.profile == ProfileKind::Uniform {
            return Ok(vec![r0; self.positions.len()]);
        }
        let eig = reference_eigen(&r0)?;
        let factor: fn(f64, f64) -> f64 = match spec.profile {
            ProfileKind::Exponential => |d, a| d.abs().powf(a),
            _ => |d, a| a * (d - 1.0) + 1.0,
        };
        Ok(self
            .scaled_distances(spec.reference_angle, spec.reference_dist, key)?
            .into_iter()
            .map(|d| {
                let p = [0, 1, 2].map(|i| factor(d, spec.alpha[i]) * eig.values[i]);
                eig.reconstruct(p)
            })
            .collect())
    }
}

/// 对角张量直接取对角线，否则做特征分解并按坐标轴对齐
fn reference_eigen(r: &SymmTensor) -> TiResult<Eigen3> {
    if r.is_diagonal() {
        return Ok(Eigen3 {
            values: [r.xx, r.yy, r.zz],
            vectors: [DVec3::X, DVec3::Y, DVec3::Z],
        });
    }
    Ok(eigen_decompose(r)?.axis_aligned())
}

impl InletFields {
    /// 由剖面描述计算统计场
    pub fn from_profiles(props: &InflowProperties, geometry: &PatchGeometry) -> TiResult<Self> {
        let spec = ProfileSpec::new(geometry, props.offset);
        let u = spec.evaluate_scalar(&props.u, "inflow.U")?;
        let r = spec.evaluate_tensor(&props.r, "inflow.R")?;
        let l = spec.evaluate_scalar(&props.l, "inflow.L")?;
        log::info!("由剖面计算入流场: U={:?}, R={:?}, L={:?}", props.u.profile, props.r.profile, props.l.profile);
        Self::new(u, r, LengthScaleField::Scalar(l))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column() -> ProfileSpec {
        // 沿 z 排列的 5 个点，z = 0.5, 1.5, ..., 4.5
        let positions = (0..5)
            .map(|k| DVec3::new(0.0, 0.0, k as f64 + 0.5))
            .collect();
        ProfileSpec::from_positions(DVec3::ZERO, positions)
    }

    #[test]
    fn test_uniform_scalar() {
        let v = column()
            .evaluate_scalar(&ScalarProfile::uniform(3.0), "U")
            .unwrap();
        assert_eq!(v, vec![3.0; 5]);
    }

    #[test]
    fn test_power_law() {
        let mut p = ScalarProfile::uniform(10.0);
        p.profile = ProfileKind::Exponential;
        p.reference_dist = 2.5;
        p.alpha = 0.5;
        let v = column().evaluate_scalar(&p, "U").unwrap();
        assert!((v[2] - 10.0).abs() < 1e-12);
        assert!((v[4] - 10.0 * (4.5f64 / 2.5).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_linear_with_angle() {
        let mut p = ScalarProfile::uniform(2.0);
        p.profile = ProfileKind::Linear;
        p.alpha = 1.0;
        p.reference_angle = 90.0;
        // 参考方向为 y，所有点 y = 0 → d = 0 → v = v0 (1 − α)
        let v = column().evaluate_scalar(&p, "U").unwrap();
        assert!(v.iter().all(|x| x.abs() < 1e-12));
    }

    #[test]
    fn test_non_positive_reference_dist() {
        let mut p = ScalarProfile::uniform(1.0);
        p.profile = ProfileKind::Linear;
        p.reference_dist = -1.0;
        let err = column().evaluate_scalar(&p, "inflow.L").unwrap_err();
        assert!(err.to_string().contains("inflow.L.reference_dist"));
    }

    #[test]
    fn test_tensor_profile_per_eigen_component() {
        let mut p = TensorProfile::uniform(SymmTensor::diagonal(4.0, 2.0, 1.0));
        p.profile = ProfileKind::Exponential;
        p.reference_dist = 0.5;
        p.alpha = [1.0, 0.0, 2.0];
        let r = column().evaluate_tensor(&p, "R").unwrap();
        // z = 1.5 → d = 3
        assert!((r[1].xx - 12.0).abs() < 1e-12);
        assert!((r[1].yy - 2.0).abs() < 1e-12);
        assert!((r[1].zz - 9.0).abs() < 1e-12);
        assert!(r[1].is_diagonal());
    }

    #[test]
    fn test_tensor_profile_uniform_alpha_scales_whole_tensor() {
        let r0 = SymmTensor::new(2.0, 0.4, 0.0, 1.0, 0.1, 0.8);
        let mut p = TensorProfile::uniform(r0);
        p.profile = ProfileKind::Linear;
        p.alpha = [1.0; 3];
        let r = column().evaluate_tensor(&p, "R").unwrap();
        // d = z，线性因子 = d
        for (k, rk) in r.iter().enumerate() {
            let d = k as f64 + 0.5;
            for i in 0..3 {
                for j in 0..3 {
                    assert!((rk.component(i, j) - d * r0.component(i, j)).abs() < 1e-10);
                }
            }
        }
    }
}
