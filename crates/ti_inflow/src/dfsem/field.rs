// crates/ti_inflow/src/dfsem/field.rs

//! 涡群：尺度、数量、播种与对流
//!
//! # 涡盒
//!
//! ```text
//! 流向   x ∈ [−σ_max, +σ_max]      （σ_max 为全局最大流向尺度）
//! 横向   本进程的边界范围
//! V0   = A_patch · 2σ_max
//! ```
//!
//! # 数量
//!
//! `N = n_eddy`（若给定），否则 `max(1, round(density · V0 / V̄))`，
//! `V̄` 为面积加权的 `8 σx σy σz`。各进程按面积份额取整，余数依次分给
//! 编号最小且有面的进程。每步校验 `Σ 本地 = N`。
//!
//! # 对流与重播
//!
//! - 流向越过 `+σ_max`：在 `−σ_max + 越界量` 处重播（新位置、新符号、新尺度）
//! - 横向越界：周期方向折回；折回后仍不在本进程范围内或非周期方向则重播

use glam::{DVec2, DVec3};
use std::collections::HashSet;
use ti_config::{DfsemConfig, EddyScaleMode};
use ti_foundation::float::{safe_div, safe_sqrt};
use ti_foundation::{TiError, TiResult};

use super::eddy::Eddy;
use crate::fields::InletFields;
use crate::numerics::eigen::eigen_decompose;
use crate::parallel::{all_gather, all_reduce_count, all_reduce_max, all_reduce_sum, Communicator};
use crate::patch::{Bounds2, PatchGeometry};
use crate::random::RandomSource;

/// 位置的逐位键，用于拒绝完全重合的涡
type PositionKey = [u64; 3];

#[inline]
fn key_of(p: DVec3) -> PositionKey {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

/// 每个面的涡尺度
///
/// `σ = min(L, κδ)`，下限为 `n_cell_per_eddy · √面积`。
/// 各向异性模式下 `σ_d = σ √(λ_d / λ_max)`，`λ_d` 为与轴 d 对齐的特征值。
pub fn eddy_scales(
    geometry: &PatchGeometry,
    fields: &InletFields,
    config: &DfsemConfig,
) -> TiResult<Vec<DVec3>> {
    let cap = config.kappa * config.delta;
    let mut floored = 0usize;
    let scales = (0..geometry.n_faces())
        .map(|i| {
            let floor = config.n_cell_per_eddy as f64 * geometry.areas()[i].sqrt();
            let mut sigma = fields.l.scalar(i).min(cap);
            if sigma < floor {
                sigma = floor;
                floored += 1;
            }
            match config.scale_mode {
                EddyScaleMode::Isotropic => Ok(DVec3::splat(sigma)),
                EddyScaleMode::Anisotropic => {
                    let lambda = eigen_decompose(&fields.r[i])?.axis_aligned_values();
                    let lambda_max = lambda.max_element();
                    if !(lambda_max > 0.0) {
                        return Ok(DVec3::splat(sigma));
                    }
                    let ratio = (lambda.max(DVec3::ZERO) / lambda_max).to_array();
                    Ok(DVec3::from_array(ratio.map(|r| (sigma * safe_sqrt(r)).max(floor))))
                }
            }
        })
        .collect::<TiResult<Vec<_>>>()?;
    if floored > 0 {
        log::info!("DFSEM: {floored} 个面的涡尺度受网格分辨率限制");
    }
    Ok(scales)
}

/// 本进程的涡群
#[derive(Debug, Clone)]
pub struct EddyField {
    eddies: Vec<Eddy>,
    n_global: usize,
    sigma_max: f64,
    sigma_reach: f64,
    v0: f64,
    face_sigma: Vec<DVec3>,
    cumulative_area: Vec<f64>,
    local_bounds: Bounds2,
    rank: usize,
    max_seed_attempts: usize,
    occupied: HashSet<PositionKey>,
}

impl EddyField {
    /// 计算尺度与数量并播种（集合操作）
    pub fn initialise(
        geometry: &PatchGeometry,
        fields: &InletFields,
        config: &DfsemConfig,
        rng: &mut RandomSource,
        comm: &dyn Communicator,
    ) -> TiResult<Self> {
        if fields.len() != geometry.n_faces() {
            return Err(TiError::size_mismatch("inlet fields", geometry.n_faces(), fields.len()));
        }
        let face_sigma = eddy_scales(geometry, fields, config)?;

        let local_max_x = face_sigma.iter().map(|s| s.x).fold(0.0, f64::max);
        let local_reach = face_sigma.iter().map(|s| s.max_element()).fold(0.0, f64::max);
        let sigma_max = all_reduce_max(comm, "dfsem.sigma_max", local_max_x)?;
        let sigma_reach = all_reduce_max(comm, "dfsem.sigma_reach", local_reach)?;
        if !(sigma_max > 0.0) {
            return Err(TiError::config("L", "涡尺度全为零"));
        }

        let total_area = geometry.total_area();
        let v0 = total_area * 2.0 * sigma_max;
        let local_volume: f64 = face_sigma
            .iter()
            .zip(geometry.areas())
            .map(|(s, a)| a * 8.0 * s.x * s.y * s.z)
            .sum();
        let mean_volume = safe_div(
            all_reduce_sum(comm, "dfsem.eddy_volume", local_volume)?,
            total_area,
            0.0,
        );

        let n_global = match config.n_eddy {
            Some(n) => n,
            None => (safe_div(config.density * v0, mean_volume, 1.0).round() as usize).max(1),
        };

        // 按面积份额分配，余数给编号最小的有面进程
        let local_area = geometry.local_area();
        let share = ((n_global as f64) * local_area / total_area).floor() as u64;
        let shares: Vec<(u64, bool)> =
            all_gather(comm, "dfsem.shares", &(share, geometry.n_faces() > 0))?;
        let assigned: u64 = shares.iter().map(|(s, _)| s).sum();
        let mut remainder = (n_global as u64).saturating_sub(assigned);
        let mut counts: Vec<u64> = shares.iter().map(|(s, _)| *s).collect();
        for (r, (_, has_faces)) in shares.iter().enumerate() {
            if remainder == 0 {
                break;
            }
            if *has_faces {
                counts[r] += 1;
                remainder -= 1;
            }
        }
        let rank = comm.rank();
        let n_local = counts[rank] as usize;
        let label_offset: u64 = counts[..rank].iter().sum();

        let mut cumulative_area = Vec::with_capacity(geometry.n_faces());
        let mut acc = 0.0;
        for &a in geometry.areas() {
            acc += a;
            cumulative_area.push(acc);
        }

        let mut field = Self {
            eddies: Vec::with_capacity(n_local),
            n_global,
            sigma_max,
            sigma_reach,
            v0,
            face_sigma,
            cumulative_area,
            local_bounds: geometry.local_bounds(),
            rank,
            max_seed_attempts: config.max_seed_attempts,
            occupied: HashSet::with_capacity(n_local),
        };
        for i in 0..n_local {
            let x = rng.uniform_range(-sigma_max, sigma_max);
            let eddy = field.spawn(label_offset + i as u64, x, geometry, rng)?;
            field.eddies.push(eddy);
        }
        field.check_population(comm)?;

        log::info!(
            "DFSEM 涡群: 全局 {} 个（本进程 {}），σ_max = {:.4e}，V0 = {:.4e}",
            n_global,
            n_local,
            sigma_max,
            v0
        );
        Ok(field)
    }

    /// 在给定流向位置生成新涡（不修改涡表）
    fn spawn(
        &mut self,
        label: u64,
        x: f64,
        geometry: &PatchGeometry,
        rng: &mut RandomSource,
    ) -> TiResult<Eddy> {
        for _ in 0..self.max_seed_attempts {
            let face = rng.pick_weighted(&self.cumulative_area).ok_or_else(|| {
                TiError::config("dfsem", format!("rank {} 没有可播种的面", self.rank))
            })?;
            let half = 0.5 * geometry.areas()[face].sqrt();
            let jitter = DVec2::new(rng.uniform_range(-half, half), rng.uniform_range(-half, half));
            let p = self.local_bounds.clamp(geometry.lateral()[face] + jitter);
            let position = DVec3::new(x, p.x, p.y);
            if self.occupied.insert(key_of(position)) {
                return Ok(Eddy {
                    label,
                    position,
                    sigma: self.face_sigma[face],
                    sign: rng.sign_vec3(),
                    owner: self.rank,
                });
            }
        }
        Err(TiError::config(
            "dfsem.max_seed_attempts",
            format!("{} 次尝试后仍无法找到不重合的涡位置", self.max_seed_attempts),
        ))
    }

    /// 在流向位置 `x` 重播第 `index` 个涡
    pub fn reseed(
        &mut self,
        index: usize,
        x: f64,
        geometry: &PatchGeometry,
        rng: &mut RandomSource,
    ) -> TiResult<()> {
        let old = self.eddies[index];
        self.occupied.remove(&key_of(old.position));
        self.eddies[index] = self.spawn(old.label, x, geometry, rng)?;
        Ok(())
    }

    /// 平移所有涡并处理越界，返回重播个数
    pub fn convect(
        &mut self,
        displacement: DVec3,
        geometry: &PatchGeometry,
        rng: &mut RandomSource,
    ) -> TiResult<usize> {
        let s = self.sigma_max;
        let mut reseeded = 0;
        for i in 0..self.eddies.len() {
            let old = self.eddies[i].position;
            self.occupied.remove(&key_of(old));
            let mut pos = old + displacement;

            let streamwise_exit = if pos.x > s {
                Some(-s + (pos.x - s).rem_euclid(2.0 * s))
            } else if pos.x < -s {
                Some(s - (-s - pos.x).rem_euclid(2.0 * s))
            } else {
                None
            };
            if let Some(x) = streamwise_exit {
                self.eddies[i] = self.spawn(self.eddies[i].label, x, geometry, rng)?;
                reseeded += 1;
                continue;
            }

            let lateral = DVec2::new(pos.y, pos.z);
            if !self.local_bounds.contains(lateral) {
                let wrapped = geometry.wrap(lateral);
                if !self.local_bounds.contains(wrapped) {
                    self.eddies[i] = self.spawn(self.eddies[i].label, pos.x, geometry, rng)?;
                    reseeded += 1;
                    continue;
                }
                pos.y = wrapped.x;
                pos.z = wrapped.y;
            }
            self.eddies[i].position = pos;
            self.occupied.insert(key_of(pos));
        }
        if reseeded > 0 {
            log::debug!("DFSEM: 本步重播 {reseeded} 个涡");
        }
        Ok(reseeded)
    }

    /// 校验全局涡数（集合操作）
    pub fn check_population(&self, comm: &dyn Communicator) -> TiResult<()> {
        let total = all_reduce_count(comm, "dfsem.population", self.eddies.len())?;
        if total != self.n_global {
            return Err(TiError::parallel(format!(
                "涡总数 {total} 与全局设定 {} 不一致",
                self.n_global
            )));
        }
        Ok(())
    }

    /// 用快照中的涡表替换（个数必须相同）
    pub fn restore(&mut self, eddies: Vec<Eddy>) -> TiResult<()> {
        if eddies.len() != self.eddies.len() {
            return Err(TiError::size_mismatch("eddies", self.eddies.len(), eddies.len()));
        }
        self.occupied = eddies.iter().map(|e| key_of(e.position)).collect();
        self.eddies = eddies;
        Ok(())
    }

    /// 本进程涡数
    pub fn n_local(&self) -> usize {
        self.eddies.len()
    }

    /// 全局涡数
    pub fn n_global(&self) -> usize {
        self.n_global
    }

    /// 本进程的涡
    pub fn eddies(&self) -> &[Eddy] {
        &self.eddies
    }

    /// 全局最大流向尺度
    pub fn sigma_max(&self) -> f64 {
        self.sigma_max
    }

    /// 全局最大尺度（任意方向）
    pub fn sigma_reach(&self) -> f64 {
        self.sigma_reach
    }

    /// 涡盒体积 `V0`
    pub fn box_volume(&self) -> f64 {
        self.v0
    }

    /// 本进程涡盒
    pub fn local_box(&self) -> (f64, f64, Bounds2) {
        (-self.sigma_max, self.sigma_max, self.local_bounds)
    }
}
