// crates/ti_inflow/src/fields.rs

//! 入流统计场：平均法向速度、雷诺应力、积分长度尺度
//!
//! 雷诺应力在边界局部坐标系中给出（x 为流向）。

use serde::{Deserialize, Serialize};
use ti_foundation::{SymmTensor, TiError, TiResult};

use crate::numerics::lund::{lund_coefficients, LundTensor};

/// 长度尺度张量：行 = 速度分量，列 = 方向 (x, y, z)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LengthScaleTensor(pub [[f64; 3]; 3]);

impl LengthScaleTensor {
    /// 各分量、各方向相同
    pub fn isotropic(l: f64) -> Self {
        Self([[l; 3]; 3])
    }

    /// `L[component][direction]`
    #[inline]
    pub fn get(&self, component: usize, direction: usize) -> f64 {
        self.0[component][direction]
    }
}

/// 积分长度尺度场
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LengthScaleField {
    /// 各向同性
    Scalar(Vec<f64>),
    /// 分量/方向相关
    Tensor(Vec<LengthScaleTensor>),
}

impl LengthScaleField {
    /// 面数
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(v) => v.len(),
            Self::Tensor(v) => v.len(),
        }
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 面 `face` 上速度分量 `component` 沿方向 `direction` 的尺度
    #[inline]
    pub fn component(&self, face: usize, component: usize, direction: usize) -> f64 {
        match self {
            Self::Scalar(v) => v[face],
            Self::Tensor(v) => v[face].get(component, direction),
        }
    }

    /// 代表性标量尺度（DFSEM 使用）
    ///
    /// 张量形式取流向速度沿流向的尺度 `L[u][x]`。
    #[inline]
    pub fn scalar(&self, face: usize) -> f64 {
        self.component(face, 0, 0)
    }

    fn validate(&self) -> TiResult<()> {
        let bad = |v: f64| !(v > 0.0) || !v.is_finite();
        match self {
            Self::Scalar(v) => {
                if let Some(i) = v.iter().position(|&l| bad(l)) {
                    return Err(TiError::config(
                        "L",
                        format!("面 {i} 的长度尺度 {} 必须为正", v[i]),
                    ));
                }
            }
            Self::Tensor(v) => {
                for (i, t) in v.iter().enumerate() {
                    if t.0.iter().flatten().any(|&l| bad(l)) {
                        return Err(TiError::config(
                            "L",
                            format!("面 {i} 的长度尺度张量含非正分量"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// 每个面的入流统计量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InletFields {
    /// 平均法向速度（沿流向为正）
    pub u_mean: Vec<f64>,
    /// 雷诺应力（局部坐标系）
    pub r: Vec<SymmTensor>,
    /// 积分长度尺度
    pub l: LengthScaleField,
}

impl InletFields {
    /// 构造并校验尺寸与取值
    pub fn new(u_mean: Vec<f64>, r: Vec<SymmTensor>, l: LengthScaleField) -> TiResult<Self> {
        let n = u_mean.len();
        if r.len() != n {
            return Err(TiError::size_mismatch("R", n, r.len()));
        }
        if l.len() != n {
            return Err(TiError::size_mismatch("L", n, l.len()));
        }
        if let Some(i) = u_mean.iter().position(|u| !u.is_finite()) {
            return Err(TiError::config("U", format!("面 {i} 的平均速度非有限")));
        }
        l.validate()?;
        Ok(Self { u_mean, r, l })
    }

    /// 全部面取相同的值
    pub fn uniform(n_faces: usize, u_mean: f64, r: SymmTensor, l: f64) -> TiResult<Self> {
        Self::new(
            vec![u_mean; n_faces],
            vec![r; n_faces],
            LengthScaleField::Scalar(vec![l; n_faces]),
        )
    }

    /// 面数
    pub fn len(&self) -> usize {
        self.u_mean.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.u_mean.is_empty()
    }

    /// 检查所有雷诺应力半正定，返回 Lund 系数
    pub fn check_stresses(&self) -> TiResult<Vec<LundTensor>> {
        lund_coefficients(&self.r)
    }

    /// 湍动能 `k = ½ tr R`
    pub fn turbulent_kinetic_energy(&self) -> Vec<f64> {
        self.r.iter().map(|r| r.turbulent_kinetic_energy()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_fields() {
        let f = InletFields::uniform(3, 10.0, SymmTensor::isotropic(1.0), 0.1).unwrap();
        assert_eq!(f.len(), 3);
        assert_eq!(f.turbulent_kinetic_energy(), vec![1.5; 3]);
        assert_eq!(f.check_stresses().unwrap().len(), 3);
    }

    #[test]
    fn test_non_positive_length_scale() {
        let err = InletFields::uniform(2, 1.0, SymmTensor::isotropic(1.0), 0.0).unwrap_err();
        assert!(matches!(err, TiError::Configuration { .. }));

        let mut t = LengthScaleTensor::isotropic(0.1);
        t.0[2][1] = -1.0;
        let err = InletFields::new(
            vec![1.0],
            vec![SymmTensor::isotropic(1.0)],
            LengthScaleField::Tensor(vec![t]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("面 0"));
    }

    #[test]
    fn test_size_mismatch() {
        let err = InletFields::new(
            vec![1.0, 1.0],
            vec![SymmTensor::isotropic(1.0)],
            LengthScaleField::Scalar(vec![0.1, 0.1]),
        )
        .unwrap_err();
        assert!(matches!(err, TiError::SizeMismatch { name: "R", .. }));
    }

    #[test]
    fn test_check_stresses_names_face() {
        let mut f = InletFields::uniform(3, 1.0, SymmTensor::isotropic(1.0), 0.1).unwrap();
        f.r[2] = SymmTensor::new(1.0, 5.0, 0.0, 1.0, 0.0, 1.0);
        let err = f.check_stresses().unwrap_err();
        assert!(err.to_string().contains("face 2"));
    }

    #[test]
    fn test_tensor_length_scale_access() {
        let mut t = LengthScaleTensor::isotropic(1.0);
        t.0[1][2] = 0.25;
        let l = LengthScaleField::Tensor(vec![t]);
        assert_eq!(l.component(0, 1, 2), 0.25);
        assert_eq!(l.scalar(0), 1.0);
    }
}
