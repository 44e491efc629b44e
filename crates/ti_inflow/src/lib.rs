// crates/ti_inflow/src/lib.rs

//! 合成湍流入口
//!
//! 为 LES/DES 入口边界生成具有目标雷诺应力与积分长度尺度的随机速度脉动，包括：
//! - 数字滤波法 (dfm)：白噪声虚拟网格 + 可分离卷积 + 一阶时间递推
//! - 离散合成涡法 (dfsem)：在入口前后的涡盒内对流紧支撑涡
//! - Lund 变换 (numerics)：把单位方差场映射到目标 R
//! - 进程间协作 (parallel)：集合归约与涡副本交换
//! - 重启快照 (state) 与单面时间序列输出 (probe)
//!
//! # 调用流程
//!
//! ```text
//! PatchFaces + InletFields + InletConfig
//!        │
//!        ▼
//! TurbulentInlet::new ──► PatchGeometry（局部坐标系、全局范围）
//!        │
//!        ▼  每步
//! FluctuationSource::advance ──► u*（单位方差，局部坐标）
//!        │
//!        ▼
//! VelocitySynthesizer ──► U = Ū e_x + Q L u*
//! ```
//!
//! # 示例
//!
//! ```
//! use std::sync::Arc;
//! use ti_config::InletConfig;
//! use ti_foundation::SymmTensor;
//! use ti_inflow::prelude::*;
//!
//! let faces = PatchFaces::rectangle(8, 8, 1.0, 1.0);
//! let fields = InletFields::uniform(64, 10.0, SymmTensor::isotropic(0.5), 0.2).unwrap();
//! let mut inlet =
//!     TurbulentInlet::new(InletConfig::default(), &faces, Some(fields), Arc::new(SerialComm)).unwrap();
//! let u = inlet.update(0.01, 0.01).unwrap();
//! assert_eq!(u.len(), 64);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dfm;
pub mod dfsem;
pub mod fields;
pub mod inlet;
pub mod numerics;
pub mod parallel;
pub mod patch;
pub mod probe;
pub mod profile;
pub mod random;
pub mod source;
pub mod state;
pub mod synthesizer;

// 重导出常用类型
pub use fields::{InletFields, LengthScaleField, LengthScaleTensor};
pub use inlet::TurbulentInlet;
pub use patch::{PatchFaces, PatchFrame, PatchGeometry};
pub use source::FluctuationSource;
pub use state::{GeneratorState, InletSnapshot};

/// 预导入模块
pub mod prelude {
    pub use crate::dfm::DfmGenerator;
    pub use crate::dfsem::DfsemGenerator;
    pub use crate::fields::{InletFields, LengthScaleField};
    pub use crate::inlet::TurbulentInlet;
    pub use crate::parallel::{Communicator, LocalWorld, SerialComm};
    pub use crate::patch::{PatchFaces, PatchGeometry};
    pub use crate::random::RandomSource;
    pub use crate::source::FluctuationSource;
    pub use crate::state::InletSnapshot;
    pub use crate::synthesizer::VelocitySynthesizer;
}
