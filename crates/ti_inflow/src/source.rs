// crates/ti_inflow/src/source.rs

//! 脉动源抽象
//!
//! 每种生成方法产生各向同性、单位方差、互不相关的局部场 `u*`，
//! 由 [`crate::synthesizer::VelocitySynthesizer`] 映射到目标雷诺应力。

use glam::DVec3;
use ti_config::InletMethod;
use ti_foundation::{TiError, TiResult};

use crate::state::GeneratorState;

/// 脉动源
pub trait FluctuationSource: Send {
    /// 生成方法
    fn method(&self) -> InletMethod;

    /// 推进 `dt` 并返回每个本地面的 `u*`（局部坐标）
    fn advance(&mut self, dt: f64) -> TiResult<Vec<DVec3>>;

    /// 导出可恢复状态
    fn state(&self) -> GeneratorState;

    /// 从快照恢复
    fn restore(&mut self, state: GeneratorState) -> TiResult<()>;
}

/// 只给平均速度的入口（脉动恒为零）
#[derive(Debug, Clone)]
pub struct MeanOnly {
    n_faces: usize,
}

impl MeanOnly {
    /// 构造
    pub fn new(n_faces: usize) -> Self {
        Self { n_faces }
    }
}

impl FluctuationSource for MeanOnly {
    fn method(&self) -> InletMethod {
        InletMethod::Mean
    }

    fn advance(&mut self, _dt: f64) -> TiResult<Vec<DVec3>> {
        Ok(vec![DVec3::ZERO; self.n_faces])
    }

    fn state(&self) -> GeneratorState {
        GeneratorState::Mean
    }

    fn restore(&mut self, state: GeneratorState) -> TiResult<()> {
        match state {
            GeneratorState::Mean => Ok(()),
            other => Err(TiError::config(
                "restart",
                format!("快照方法 {} 与 mean 不符", other.method()),
            )),
        }
    }
}
