// crates/ti_inflow/src/dfm/temporal.rs

//! DFM 时间相关
//!
//! ```text
//! u_new = a · u_old + b · r_new
//! a = exp(−π · dt / (2T)),  b = √(1 − a²),  T = L[c][x] / |U|
//! ```
//!
//! `a² + b² = 1`，单位方差在递推中保持不变。首次调用时 `u_old := r_new`。

use glam::DVec3;
use ti_foundation::float::safe_sqrt;
use ti_foundation::{TiError, TiResult};

use crate::fields::InletFields;

/// 计算时间尺度时允许的最小速度
pub const MIN_VELOCITY: f64 = 1e-6;

/// 时间相关器
#[derive(Debug, Clone)]
pub struct TemporalCorrelator {
    timescales: Vec<DVec3>,
    previous: Option<Vec<DVec3>>,
}

impl TemporalCorrelator {
    /// 由入流场计算每个面、每个分量的拉格朗日时间尺度
    pub fn new(fields: &InletFields) -> Self {
        let mut clamped = 0usize;
        let timescales = (0..fields.len())
            .map(|face| {
                let mut speed = fields.u_mean[face].abs();
                if speed < MIN_VELOCITY {
                    speed = MIN_VELOCITY;
                    clamped += 1;
                }
                DVec3::new(
                    fields.l.component(face, 0, 0),
                    fields.l.component(face, 1, 0),
                    fields.l.component(face, 2, 0),
                ) / speed
            })
            .collect();
        if clamped > 0 {
            log::warn!("DFM: {clamped} 个面的平均速度接近零，时间尺度按 |U| = {MIN_VELOCITY:e} 计算");
        }
        Self {
            timescales,
            previous: None,
        }
    }

    /// 面 `face` 分量 `component` 的递推系数 `(a, b)`
    #[inline]
    pub fn coefficients(&self, face: usize, component: usize, dt: f64) -> (f64, f64) {
        let t = self.timescales[face][component];
        let a = (-std::f64::consts::PI * dt / (2.0 * t)).exp();
        (a, safe_sqrt(1.0 - a * a))
    }

    /// 与新样本混合，返回并记住新的时间相关场
    pub fn blend(&mut self, fresh: &[DVec3], dt: f64) -> TiResult<Vec<DVec3>> {
        if fresh.len() != self.timescales.len() {
            return Err(TiError::size_mismatch("fluctuation", self.timescales.len(), fresh.len()));
        }
        if !(dt >= 0.0) || !dt.is_finite() {
            return Err(TiError::numerical("dfm.temporal", format!("时间步长 {dt} 非法")));
        }
        let blended: Vec<DVec3> = match &self.previous {
            None => fresh.to_vec(),
            Some(old) => old
                .iter()
                .zip(fresh)
                .enumerate()
                .map(|(face, (u_old, r))| {
                    let mut u = [0.0; 3];
                    for (c, slot) in u.iter_mut().enumerate() {
                        let (a, b) = self.coefficients(face, c, dt);
                        *slot = a * u_old[c] + b * r[c];
                    }
                    DVec3::from_array(u)
                })
                .collect(),
        };
        self.previous = Some(blended.clone());
        Ok(blended)
    }

    /// 上一步的场
    pub fn state(&self) -> Option<&[DVec3]> {
        self.previous.as_deref()
    }

    /// 恢复上一步的场
    pub fn restore(&mut self, previous: Option<Vec<DVec3>>) -> TiResult<()> {
        if let Some(p) = &previous {
            if p.len() != self.timescales.len() {
                return Err(TiError::size_mismatch("temporal state", self.timescales.len(), p.len()));
            }
        }
        self.previous = previous;
        Ok(())
    }
}
