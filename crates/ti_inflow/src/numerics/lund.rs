// crates/ti_inflow/src/numerics/lund.rs

//! Lund 变换
//!
//! 将各向同性、单位方差、互不相关的输入 `u*` 映射为协方差为 `R` 的脉动：
//!
//! ```text
//! u' = L · u*,   L Lᵀ = R
//!
//!       | √R11                                  0                    0 |
//! L  =  | R21/L11                 √(R22 − L21²)                      0 |
//!       | R31/L11   (R32 − L21 L31)/L22          √(R33 − L31² − L32²) |
//! ```
//!
//! 参考: Lund, Wu & Squires (1998), J. Comput. Phys. 140:233-258

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};
use ti_foundation::float::safe_sqrt;
use ti_foundation::{SymmTensor, TiError, TiResult};

/// 被开方数的相对容差（相对于最大对角分量）
pub const RADICAND_TOLERANCE: f64 = 1e-10;

/// 对角系数的最小安全值
pub const MIN_LUND_DIAGONAL: f64 = 1e-12;

/// Lund 系数（下三角）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LundTensor {
    /// L11
    pub xx: f64,
    /// L21
    pub yx: f64,
    /// L22
    pub yy: f64,
    /// L31
    pub zx: f64,
    /// L32
    pub zy: f64,
    /// L33
    pub zz: f64,
}

impl LundTensor {
    /// 由雷诺应力闭式分解
    ///
    /// `context` 用于错误信息（通常是面编号）。
    pub fn from_stress(r: &SymmTensor, context: &str) -> TiResult<Self> {
        if !r.is_finite() {
            return Err(TiError::numerical(context, "雷诺应力含非有限分量"));
        }
        for (name, d) in [("R_xx", r.xx), ("R_yy", r.yy), ("R_zz", r.zz)] {
            if d <= 0.0 {
                return Err(TiError::numerical(
                    context,
                    format!("{name} = {d:e} 非正，雷诺应力不是正定的"),
                ));
            }
        }
        let tol = RADICAND_TOLERANCE * r.xx.max(r.yy).max(r.zz);

        let l11 = r.xx.sqrt();
        let l21 = r.xy / l11;
        let l31 = r.xz / l11;

        let l22 = checked_sqrt(r.yy - l21 * l21, tol, context, "R_yy - L21²")?;
        let l32 = if l22 < MIN_LUND_DIAGONAL {
            log::warn!("[{context}] Lund 系数 L22 接近零，L32 截断为 0");
            0.0
        } else {
            (r.yz - l21 * l31) / l22
        };
        let l33 = checked_sqrt(r.zz - l31 * l31 - l32 * l32, tol, context, "R_zz - L31² - L32²")?;

        Ok(Self {
            xx: l11,
            yx: l21,
            yy: l22,
            zx: l31,
            zy: l32,
            zz: l33,
        })
    }

    /// `L · v`
    #[inline]
    pub fn apply(&self, v: DVec3) -> DVec3 {
        DVec3::new(
            self.xx * v.x,
            self.yx * v.x + self.yy * v.y,
            self.zx * v.x + self.zy * v.y + self.zz * v.z,
        )
    }

    /// 转换为 glam 矩阵（列主序）
    pub fn to_mat3(&self) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(self.xx, self.yx, self.zx),
            DVec3::new(0.0, self.yy, self.zy),
            DVec3::new(0.0, 0.0, self.zz),
        )
    }

    /// 重构 `L Lᵀ`
    pub fn reconstruct(&self) -> SymmTensor {
        let m = self.to_mat3();
        SymmTensor::from_mat3(&(m * m.transpose()))
    }
}

fn checked_sqrt(radicand: f64, tol: f64, context: &str, what: &str) -> TiResult<f64> {
    if radicand < -tol {
        return Err(TiError::numerical(
            context,
            format!("{what} = {radicand:e} < 0，雷诺应力不是半正定的"),
        ));
    }
    Ok(safe_sqrt(radicand))
}

/// 逐面计算 Lund 系数
pub fn lund_coefficients(r: &[SymmTensor]) -> TiResult<Vec<LundTensor>> {
    r.iter()
        .enumerate()
        .map(|(i, ri)| LundTensor::from_stress(ri, &format!("face {i}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_reconstructs(r: SymmTensor) {
        let l = LundTensor::from_stress(&r, "test").unwrap();
        let back = l.reconstruct();
        let scale = r.max_abs();
        for i in 0..3 {
            for j in 0..3 {
                let diff = (back.component(i, j) - r.component(i, j)).abs();
                assert!(diff < 1e-12 * scale.max(1.0), "({i},{j}) diff {diff}");
            }
        }
    }

    #[test]
    fn test_isotropic() {
        let l = LundTensor::from_stress(&SymmTensor::isotropic(0.5), "iso").unwrap();
        assert!((l.xx - 0.5).abs() < 1e-15);
        assert_eq!(l.yx, 0.0);
        assert_reconstructs(SymmTensor::isotropic(0.5));
    }

    #[test]
    fn test_channel_like_stress() {
        // 槽道近壁区典型各向异性应力（uv < 0）
        assert_reconstructs(SymmTensor::new(7.0, -0.8, 0.1, 1.2, 0.05, 2.0));
        assert_reconstructs(SymmTensor::new(1e-4, 2e-5, -1e-5, 5e-5, 1e-6, 3e-5));
    }

    #[test]
    fn test_random_psd_tensors() {
        let mut rng = crate::random::RandomSource::new(11, 0);
        for _ in 0..200 {
            let a = rng.normal_vec3();
            let b = rng.normal_vec3();
            let c = rng.normal_vec3();
            // A Aᵀ 加小对角项保证正定
            let r = SymmTensor::outer(a) + SymmTensor::outer(b) + SymmTensor::outer(c)
                + SymmTensor::isotropic(0.1);
            assert_reconstructs(r);
        }
    }

    #[test]
    fn test_apply_matches_matrix() {
        let r = SymmTensor::new(2.0, 0.3, 0.1, 1.0, -0.2, 0.7);
        let l = LundTensor::from_stress(&r, "t").unwrap();
        let v = DVec3::new(0.3, -1.2, 0.8);
        let diff = (l.apply(v) - l.to_mat3() * v).length();
        assert!(diff < 1e-14);
    }

    #[test]
    fn test_non_positive_diagonal_fails() {
        let r = SymmTensor::diagonal(1.0, 0.0, 1.0);
        let err = LundTensor::from_stress(&r, "face 3").unwrap_err();
        assert!(err.to_string().contains("face 3"));
    }

    #[test]
    fn test_non_psd_fails() {
        // |R12| > √(R11 R22)
        let r = SymmTensor::new(1.0, 2.0, 0.0, 1.0, 0.0, 1.0);
        assert!(matches!(
            LundTensor::from_stress(&r, "x"),
            Err(TiError::Numerical { .. })
        ));
    }

    #[test]
    fn test_degenerate_psd_is_clamped() {
        // 完全相关的 u、v 分量：R22 - L21² = 0
        let r = SymmTensor::new(1.0, 1.0, 0.0, 1.0, 0.0, 1.0);
        let l = LundTensor::from_stress(&r, "degenerate").unwrap();
        assert_eq!(l.yy, 0.0);
        assert_eq!(l.zy, 0.0);
        assert_reconstructs(r);
    }

    #[test]
    fn test_lund_coefficients_reports_face() {
        let fields = vec![SymmTensor::isotropic(1.0), SymmTensor::diagonal(1.0, -1.0, 1.0)];
        let err = lund_coefficients(&fields).unwrap_err();
        assert!(err.to_string().contains("face 1"));
    }
}
