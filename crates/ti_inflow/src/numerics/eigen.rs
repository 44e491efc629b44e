// crates/ti_inflow/src/numerics/eigen.rs

//! 对称 3×3 张量的特征分解
//!
//! 用于各向异性涡尺度和张量剖面，底层调用 `nalgebra::SymmetricEigen`。

use glam::DVec3;
use nalgebra::{Matrix3, SymmetricEigen};
use ti_foundation::{SymmTensor, TiError, TiResult};

/// 特征值按降序排列的分解结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eigen3 {
    /// 特征值（降序）
    pub values: [f64; 3],
    /// 对应的单位特征向量
    pub vectors: [DVec3; 3],
}

/// 三个轴的全部排列
const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

impl Eigen3 {
    /// 按坐标轴重排特征对
    ///
    /// 返回结果的第 `d` 对特征值/向量与轴 `d` 最对齐。采用使
    /// `Σ_d |v_d · e_d|` 最大的排列，重根时也保证一一对应。
    pub fn axis_aligned(&self) -> Eigen3 {
        let mut best = PERMUTATIONS[0];
        let mut best_score = f64::NEG_INFINITY;
        for perm in PERMUTATIONS {
            let score: f64 = (0..3).map(|d| self.vectors[perm[d]][d].abs()).sum();
            if score > best_score {
                best_score = score;
                best = perm;
            }
        }
        Eigen3 {
            values: best.map(|i| self.values[i]),
            vectors: best.map(|i| self.vectors[i]),
        }
    }

    /// 与坐标轴对齐的特征值 `(λ_x, λ_y, λ_z)`
    pub fn axis_aligned_values(&self) -> DVec3 {
        DVec3::from_array(self.axis_aligned().values)
    }

    /// 由特征分量重构 `Σ λ_i v_i v_iᵀ`
    pub fn reconstruct(&self, values: [f64; 3]) -> SymmTensor {
        (0..3).fold(SymmTensor::ZERO, |acc, i| {
            acc + SymmTensor::outer(self.vectors[i]) * values[i]
        })
    }
}

/// 特征分解
pub fn eigen_decompose(r: &SymmTensor) -> TiResult<Eigen3> {
    if !r.is_finite() {
        return Err(TiError::numerical("eigen_decompose", "张量含非有限分量"));
    }
    let m = Matrix3::new(r.xx, r.xy, r.xz, r.xy, r.yy, r.yz, r.xz, r.yz, r.zz);
    let eig = SymmetricEigen::new(m);

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let mut values = [0.0; 3];
    let mut vectors = [DVec3::ZERO; 3];
    for (slot, &i) in order.iter().enumerate() {
        values[slot] = eig.eigenvalues[i];
        let col = eig.eigenvectors.column(i);
        vectors[slot] = DVec3::new(col[0], col[1], col[2]).normalize_or_zero();
    }
    Ok(Eigen3 { values, vectors })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagonal_tensor() {
        let e = eigen_decompose(&SymmTensor::diagonal(1.0, 4.0, 2.0)).unwrap();
        assert!((e.values[0] - 4.0).abs() < 1e-12);
        assert!((e.values[2] - 1.0).abs() < 1e-12);
        let aligned = e.axis_aligned_values();
        assert!((aligned - DVec3::new(1.0, 4.0, 2.0)).length() < 1e-12);
    }

    #[test]
    fn test_isotropic_assigns_every_axis() {
        let e = eigen_decompose(&SymmTensor::isotropic(1.0)).unwrap();
        let aligned = e.axis_aligned_values();
        assert!((aligned - DVec3::ONE).length() < 1e-12);
    }

    #[test]
    fn test_reconstruct_full_tensor() {
        let r = SymmTensor::new(3.0, 0.5, -0.2, 2.0, 0.3, 1.0);
        let e = eigen_decompose(&r).unwrap();
        let back = e.reconstruct(e.values);
        for i in 0..3 {
            for j in 0..3 {
                assert!((back.component(i, j) - r.component(i, j)).abs() < 1e-10);
            }
        }
    }
}
