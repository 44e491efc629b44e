// crates/ti_foundation/src/lib.rs

//! TurbInflow Foundation Layer
//!
//! 基础层，提供整个项目共享的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型（配置 / 数值 / 并行一致性）
//! - [`float`]: 安全浮点运算与数值常量
//! - [`tensor`]: 对称二阶张量（雷诺应力）
//!
//! # 示例
//!
//! ```
//! use ti_foundation::{SymmTensor, TiError, TiResult};
//!
//! fn check(r: &SymmTensor) -> TiResult<f64> {
//!     if r.xx <= 0.0 {
//!         return Err(TiError::numerical("face 0", "R_xx 非正"));
//!     }
//!     Ok(r.turbulent_kinetic_energy())
//! }
//!
//! let r = SymmTensor::diagonal(1.0, 1.0, 1.0);
//! assert_eq!(check(&r).unwrap(), 1.5);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod float;
pub mod tensor;

pub use error::{TiError, TiResult};
pub use tensor::SymmTensor;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{TiError, TiResult};
    pub use crate::float::{safe_div, safe_sqrt, KahanSum};
    pub use crate::tensor::SymmTensor;
}
