// crates/ti_inflow/src/synthesizer.rs

//! 速度合成
//!
//! ```text
//! U = Ū · e_x + Q · (L · u*)
//! ```
//!
//! `L` 为 Lund 系数（`L Lᵗ = R`），`Q` 为局部 → 全局旋转。

use glam::DVec3;
use rayon::prelude::*;
use ti_foundation::{SymmTensor, TiError, TiResult};

use crate::fields::InletFields;
use crate::numerics::lund::{lund_coefficients, LundTensor};
use crate::patch::PatchFrame;

/// 一步的合成结果（全局坐标）
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    /// 脉动 `u'`
    pub fluctuation: Vec<DVec3>,
    /// 总速度
    pub velocity: Vec<DVec3>,
}

/// 速度合成器
#[derive(Debug, Clone)]
pub struct VelocitySynthesizer {
    frame: PatchFrame,
    u_mean: Vec<f64>,
    lund: Vec<LundTensor>,
}

impl VelocitySynthesizer {
    /// 构造（雷诺应力须全部半正定）
    pub fn new(frame: PatchFrame, fields: &InletFields) -> TiResult<Self> {
        Ok(Self {
            frame,
            u_mean: fields.u_mean.clone(),
            lund: fields.check_stresses()?,
        })
    }

    /// 只有平均速度的合成器（不检查雷诺应力，脉动系数为零）
    pub fn mean_only(frame: PatchFrame, u_mean: &[f64]) -> Self {
        Self {
            frame,
            u_mean: u_mean.to_vec(),
            lund: vec![LundTensor::default(); u_mean.len()],
        }
    }

    /// 面数
    pub fn len(&self) -> usize {
        self.u_mean.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.u_mean.is_empty()
    }

    /// Lund 系数
    pub fn lund(&self) -> &[LundTensor] {
        &self.lund
    }

    /// 替换雷诺应力
    ///
    /// 任一张量非半正定时返回错误，原系数保持不变。
    pub fn set_reynolds_stress(&mut self, r: &[SymmTensor]) -> TiResult<()> {
        if r.len() != self.len() {
            return Err(TiError::size_mismatch("R", self.len(), r.len()));
        }
        self.lund = lund_coefficients(r)?;
        Ok(())
    }

    /// 全局坐标下的脉动 `Q · (L · u*)`
    pub fn fluctuation(&self, u_star: &[DVec3]) -> TiResult<Vec<DVec3>> {
        if u_star.len() != self.len() {
            return Err(TiError::size_mismatch("u*", self.len(), u_star.len()));
        }
        let frame = self.frame;
        Ok(self
            .lund
            .par_iter()
            .zip(u_star.par_iter())
            .map(|(l, &u)| frame.to_global(l.apply(u)))
            .collect())
    }

    /// 同时给出脉动与总速度 `Ū e_x + u'`
    pub fn synthesize(&self, u_star: &[DVec3]) -> TiResult<Synthesized> {
        let fluctuation = self.fluctuation(u_star)?;
        let e_x = self.frame.e_x;
        let velocity = fluctuation
            .iter()
            .zip(&self.u_mean)
            .map(|(&u, &mean)| mean * e_x + u)
            .collect();
        Ok(Synthesized {
            fluctuation,
            velocity,
        })
    }
}
