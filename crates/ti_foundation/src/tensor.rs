// crates/ti_foundation/src/tensor.rs

//! 对称二阶张量
//!
//! 用于雷诺应力 `R_ij = <u_i' u_j'>`，分量按 OpenFOAM 习惯存储为
//! `(xx, xy, xz, yy, yz, zz)`。

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// 3×3 对称张量
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SymmTensor {
    /// xx 分量
    pub xx: f64,
    /// xy 分量
    pub xy: f64,
    /// xz 分量
    pub xz: f64,
    /// yy 分量
    pub yy: f64,
    /// yz 分量
    pub yz: f64,
    /// zz 分量
    pub zz: f64,
}

impl SymmTensor {
    /// 零张量
    pub const ZERO: Self = Self {
        xx: 0.0,
        xy: 0.0,
        xz: 0.0,
        yy: 0.0,
        yz: 0.0,
        zz: 0.0,
    };

    /// 由六个独立分量构造
    pub const fn new(xx: f64, xy: f64, xz: f64, yy: f64, yz: f64, zz: f64) -> Self {
        Self {
            xx,
            xy,
            xz,
            yy,
            yz,
            zz,
        }
    }

    /// 对角张量
    pub const fn diagonal(xx: f64, yy: f64, zz: f64) -> Self {
        Self::new(xx, 0.0, 0.0, yy, 0.0, zz)
    }

    /// 各向同性雷诺应力 `diag(u'², u'², u'²)`
    pub fn isotropic(u_rms: f64) -> Self {
        let v = u_rms * u_rms;
        Self::diagonal(v, v, v)
    }

    /// 外积 `a aᵀ`
    pub fn outer(a: DVec3) -> Self {
        Self::new(
            a.x * a.x,
            a.x * a.y,
            a.x * a.z,
            a.y * a.y,
            a.y * a.z,
            a.z * a.z,
        )
    }

    /// 按 (i, j) 取分量
    #[inline]
    pub fn component(&self, i: usize, j: usize) -> f64 {
        match (i.min(j), i.max(j)) {
            (0, 0) => self.xx,
            (0, 1) => self.xy,
            (0, 2) => self.xz,
            (1, 1) => self.yy,
            (1, 2) => self.yz,
            _ => self.zz,
        }
    }

    /// 迹
    #[inline]
    pub fn trace(&self) -> f64 {
        self.xx + self.yy + self.zz
    }

    /// 湍动能 `k = ½ tr(R)`
    #[inline]
    pub fn turbulent_kinetic_energy(&self) -> f64 {
        0.5 * self.trace()
    }

    /// 对角分量
    #[inline]
    pub fn diag(&self) -> DVec3 {
        DVec3::new(self.xx, self.yy, self.zz)
    }

    /// 非对角分量是否全为零
    pub fn is_diagonal(&self) -> bool {
        self.xy == 0.0 && self.xz == 0.0 && self.yz == 0.0
    }

    /// 所有分量是否有限
    pub fn is_finite(&self) -> bool {
        [self.xx, self.xy, self.xz, self.yy, self.yz, self.zz]
            .iter()
            .all(|v| v.is_finite())
    }

    /// 转换为 glam 矩阵
    pub fn to_mat3(&self) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(self.xx, self.xy, self.xz),
            DVec3::new(self.xy, self.yy, self.yz),
            DVec3::new(self.xz, self.yz, self.zz),
        )
    }

    /// 由一般矩阵取对称部分
    pub fn from_mat3(m: &DMat3) -> Self {
        let a = m.to_cols_array_2d();
        // a[col][row]
        Self::new(
            a[0][0],
            0.5 * (a[0][1] + a[1][0]),
            0.5 * (a[0][2] + a[2][0]),
            a[1][1],
            0.5 * (a[1][2] + a[2][1]),
            a[2][2],
        )
    }

    /// 最大绝对分量
    pub fn max_abs(&self) -> f64 {
        [self.xx, self.xy, self.xz, self.yy, self.yz, self.zz]
            .iter()
            .fold(0.0_f64, |m, v| m.max(v.abs()))
    }
}

impl Add for SymmTensor {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.xx + rhs.xx,
            self.xy + rhs.xy,
            self.xz + rhs.xz,
            self.yy + rhs.yy,
            self.yz + rhs.yz,
            self.zz + rhs.zz,
        )
    }
}

impl Mul<f64> for SymmTensor {
    type Output = Self;

    fn mul(self, s: f64) -> Self {
        Self::new(
            self.xx * s,
            self.xy * s,
            self.xz * s,
            self.yy * s,
            self.yz * s,
            self.zz * s,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_symmetry() {
        let r = SymmTensor::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(r.component(i, j), r.component(j, i));
            }
        }
        assert_eq!(r.component(1, 2), 5.0);
    }

    #[test]
    fn test_mat3_roundtrip() {
        let r = SymmTensor::new(1.0, 0.2, -0.1, 2.0, 0.3, 3.0);
        let back = SymmTensor::from_mat3(&r.to_mat3());
        assert_eq!(r, back);
    }

    #[test]
    fn test_tke() {
        let r = SymmTensor::isotropic(2.0);
        assert_eq!(r.turbulent_kinetic_energy(), 6.0);
    }

    #[test]
    fn test_outer_product() {
        let r = SymmTensor::outer(DVec3::new(1.0, 2.0, 0.0));
        assert_eq!(r.xy, 2.0);
        assert_eq!(r.yy, 4.0);
        assert_eq!(r.zz, 0.0);
    }

    #[test]
    fn test_serde_json() {
        let r = SymmTensor::diagonal(1.0, 2.0, 3.0);
        let s = serde_json::to_string(&r).unwrap();
        let back: SymmTensor = serde_json::from_str(&s).unwrap();
        assert_eq!(r, back);
    }
}
