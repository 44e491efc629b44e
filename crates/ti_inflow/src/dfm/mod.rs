// crates/ti_inflow/src/dfm/mod.rs

//! 数字滤波法（Digital Filter Method）
//!
//! # 模块概览
//!
//! - [`kernel`]: 一维 / 二维滤波核（高斯、指数相关）
//! - [`grid`]: 覆盖边界的三分量白噪声虚拟网格
//! - [`spatial`]: 可分离两遍卷积
//! - [`temporal`]: 一阶递推时间相关
//! - [`generator`]: 组合为 [`crate::source::FluctuationSource`]
//!
//! 参考: Klein, Sadiki & Janicka (2003); Xie & Castro (2008)

pub mod generator;
pub mod grid;
pub mod kernel;
pub mod spatial;
pub mod temporal;

pub use generator::{DfmGenerator, DfmState};
pub use grid::{GridLayout, VirtualGrid};
pub use kernel::{FilterKernel, Kernel2D};
pub use spatial::SpatialCorrelator;
pub use temporal::TemporalCorrelator;
