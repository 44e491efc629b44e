// crates/ti_config/src/lib.rs

//! TurbInflow Config Layer
//!
//! 入口边界湍流生成器的配置层。所有数值使用 f64，可经 JSON 读写。
//!
//! # 模块概览
//!
//! - [`inlet_config`]: `InletConfig` 及 DFM / DFSEM / 输出子配置
//! - [`profile`]: 入流剖面（uniform / exponential / linear）描述
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! ti_cli        ─> InletConfig::from_json_file
//! ti_inflow     ─> TurbulentInlet::new(&InletConfig, ...)
//! ti_config     ─> 本层
//! ti_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod inlet_config;
pub mod profile;

pub use error::ConfigError;
pub use inlet_config::{
    DfmConfig, DfsemConfig, EddyScaleMode, FilterShape, InletConfig, InletMethod, MapMethod,
    OutputConfig, RestartMode,
};
pub use profile::{InflowProperties, ProfileKind, ScalarProfile, TensorProfile};
