// crates/ti_inflow/src/dfm/generator.rs

//! DFM 生成器：白噪声网格 → 空间相关 → 时间相关

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ti_config::{DfmConfig, InletMethod};
use ti_foundation::{TiError, TiResult};

use super::grid::VirtualGrid;
use super::spatial::SpatialCorrelator;
use super::temporal::TemporalCorrelator;
use crate::fields::InletFields;
use crate::parallel::Communicator;
use crate::patch::PatchGeometry;
use crate::random::{RandomSource, RngState};
use crate::source::FluctuationSource;
use crate::state::GeneratorState;

/// DFM 可恢复状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfmState {
    /// 随机流位置
    pub rng: RngState,
    /// 上一步时间相关场
    pub temporal: Option<Vec<DVec3>>,
    /// 冻结的白噪声网格
    pub frozen_grid: Option<[Vec<f64>; 3]>,
}

/// DFM 生成器
pub struct DfmGenerator {
    comm: Arc<dyn Communicator>,
    grid: VirtualGrid,
    correlator: SpatialCorrelator,
    temporal: TemporalCorrelator,
    rng: RandomSource,
    frozen: bool,
    drawn: bool,
}

impl DfmGenerator {
    /// 构造（集合操作）
    pub fn new(
        geometry: &PatchGeometry,
        fields: &InletFields,
        config: &DfmConfig,
        rng: RandomSource,
        comm: Arc<dyn Communicator>,
    ) -> TiResult<Self> {
        if fields.len() != geometry.n_faces() {
            return Err(TiError::size_mismatch("inlet fields", geometry.n_faces(), fields.len()));
        }
        let correlator = SpatialCorrelator::new(geometry, &fields.l, config, comm.as_ref())?;
        let grid = VirtualGrid::new(correlator.layout().clone());
        Ok(Self {
            comm,
            grid,
            correlator,
            temporal: TemporalCorrelator::new(fields),
            rng,
            frozen: config.frozen_random_field,
            drawn: false,
        })
    }

    /// 当前虚拟网格
    pub fn grid(&self) -> &VirtualGrid {
        &self.grid
    }
}

impl FluctuationSource for DfmGenerator {
    fn method(&self) -> InletMethod {
        InletMethod::Dfm
    }

    fn advance(&mut self, dt: f64) -> TiResult<Vec<DVec3>> {
        if !self.frozen || !self.drawn {
            self.grid.redraw(&mut self.rng, self.comm.as_ref())?;
            self.drawn = true;
        }
        let fresh = self.correlator.correlate(&self.grid);
        self.temporal.blend(&fresh, dt)
    }

    fn state(&self) -> GeneratorState {
        GeneratorState::Dfm(DfmState {
            rng: self.rng.state(),
            temporal: self.temporal.state().map(<[DVec3]>::to_vec),
            frozen_grid: (self.frozen && self.drawn).then(|| self.grid.data().clone()),
        })
    }

    fn restore(&mut self, state: GeneratorState) -> TiResult<()> {
        let state = match state {
            GeneratorState::Dfm(s) => s,
            other => {
                return Err(TiError::config(
                    "restart",
                    format!("快照方法 {} 与 DFM 不符", other.method()),
                ))
            }
        };
        self.temporal.restore(state.temporal)?;
        self.rng = RandomSource::from_state(&state.rng);
        match state.frozen_grid {
            Some(data) if self.frozen => {
                self.grid.fill_from(data)?;
                self.drawn = true;
            }
            _ => self.drawn = false,
        }
        Ok(())
    }
}
