// crates/ti_inflow/src/numerics/mod.rs

//! 数值工具
//!
//! - [`bessel`]: 零阶修正 Bessel 函数 `I0`、`K0`
//! - [`lund`]: 雷诺应力的 Lund 分解
//! - [`eigen`]: 对称张量特征分解（nalgebra）

pub mod bessel;
pub mod eigen;
pub mod lund;

pub use bessel::{bessel_i0, bessel_i0_scaled, bessel_k0};
pub use eigen::{eigen_decompose, Eigen3};
pub use lund::{lund_coefficients, LundTensor};
