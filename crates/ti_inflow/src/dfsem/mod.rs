// crates/ti_inflow/src/dfsem/mod.rs

//! 离散合成涡法（DFSEM）
//!
//! 涡贡献为符号与各向紧支撑形函数之积（经典 SEM 形式），不做无散修正。
//!
//! # 模块概览
//!
//! - [`eddy`]: 涡与紧支撑形函数
//! - [`field`]: 涡群的播种、对流与再播种
//! - [`exchange`]: 跨进程涡副本交换
//! - [`generator`]: 组合为 [`crate::source::FluctuationSource`]
//!
//! 参考: Jarrin et al. (2006); Poletto, Craft & Revell (2013)

pub mod eddy;
pub mod exchange;
pub mod field;
pub mod generator;

pub use eddy::{shape_function, Eddy};
pub use exchange::EddyExchange;
pub use field::{eddy_scales, EddyField};
pub use generator::{DfsemGenerator, DfsemState};
