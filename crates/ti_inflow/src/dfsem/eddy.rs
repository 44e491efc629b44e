// crates/ti_inflow/src/dfsem/eddy.rs

//! 单个涡及其形函数
//!
//! ```text
//! g(r)   = √(4/3) · cos²(π r / 2),   |r| < 1；否则 0
//! f_σ(x) = √(V0 / (σx σy σz)) · g(x/σx) · g(y/σy) · g(z/σz)
//! ```
//!
//! `∫₋₁¹ g² = 1`，因此在体积 `V0` 内均匀分布的涡满足 `E[f_σ²] = 1`。

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::patch::Bounds2;

/// `√(4/3)`
const SHAPE_NORM: f64 = 1.154_700_538_379_251_5;

/// 一维形函数 `g(r)`
#[inline]
pub fn shape_function(r: f64) -> f64 {
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let c = (std::f64::consts::FRAC_PI_2 * r).cos();
    SHAPE_NORM * c * c
}

/// 涡
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Eddy {
    /// 全局编号
    pub label: u64,
    /// 位置（局部坐标，x 为流向，入口平面 x = 0）
    pub position: DVec3,
    /// 各方向尺度
    pub sigma: DVec3,
    /// 各速度分量的符号（±1）
    pub sign: DVec3,
    /// 所属进程
    pub owner: usize,
}

impl Eddy {
    /// 横向坐标
    #[inline]
    pub fn lateral(&self) -> DVec2 {
        DVec2::new(self.position.y, self.position.z)
    }

    /// 横向影响范围 `position ± σ`
    pub fn influence_box(&self) -> Bounds2 {
        let half = DVec2::new(self.sigma.y, self.sigma.z);
        Bounds2::new(self.lateral() - half, self.lateral() + half)
    }

    /// 在相对位移 `d = x − x_k`（已取最小镜像）处的贡献 `sign · f_σ(d)`
    #[inline]
    pub fn contribution(&self, d: DVec3, v0: f64) -> DVec3 {
        let r = d / self.sigma;
        if r.x.abs() >= 1.0 || r.y.abs() >= 1.0 || r.z.abs() >= 1.0 {
            return DVec3::ZERO;
        }
        let volume = self.sigma.x * self.sigma.y * self.sigma.z;
        let f = (v0 / volume).sqrt()
            * shape_function(r.x)
            * shape_function(r.y)
            * shape_function(r.z);
        self.sign * f
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_normalization() {
        // 中点法积分 ∫₋₁¹ g² dr
        let n = 20000;
        let h = 2.0 / n as f64;
        let integral: f64 = (0..n)
            .map(|i| {
                let r = -1.0 + (i as f64 + 0.5) * h;
                shape_function(r).powi(2) * h
            })
            .sum();
        assert!((integral - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_shape_support() {
        assert_eq!(shape_function(1.0), 0.0);
        assert_eq!(shape_function(-1.5), 0.0);
        assert!((shape_function(0.0) - SHAPE_NORM).abs() < 1e-15);
        assert!(shape_function(0.999) < 1e-5);
    }

    #[test]
    fn test_contribution_sign_and_support() {
        let eddy = Eddy {
            label: 0,
            position: DVec3::ZERO,
            sigma: DVec3::new(0.5, 0.2, 0.2),
            sign: DVec3::new(1.0, -1.0, 1.0),
            owner: 0,
        };
        let c = eddy.contribution(DVec3::new(0.1, 0.0, 0.05), 1.0);
        assert!(c.x > 0.0 && c.y < 0.0 && c.z > 0.0);
        assert!((c.x + c.y).abs() < 1e-15);
        assert_eq!(eddy.contribution(DVec3::new(0.0, 0.25, 0.0), 1.0), DVec3::ZERO);

        let b = eddy.influence_box();
        assert!((b.extent() - DVec2::new(0.4, 0.4)).length() < 1e-15);
    }
}
