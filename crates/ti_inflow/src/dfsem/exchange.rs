// crates/ti_inflow/src/dfsem/exchange.rs

//! 跨进程涡交换
//!
//! 初始化时全收集各进程的横向范围；与本进程范围（外扩 σ 并计入周期镜像）
//! 相交的进程为邻居。每步向每个邻居发送影响范围与其相交的本地涡副本，
//! 收到的远程涡只在本步有效。

use ti_foundation::TiResult;

use super::eddy::Eddy;
use crate::parallel::{all_gather, exchange, Communicator};
use crate::patch::{Bounds2, PatchGeometry};

/// 涡交换器
#[derive(Debug, Clone)]
pub struct EddyExchange {
    rank: usize,
    bounds: Vec<Bounds2>,
    neighbours: Vec<usize>,
}

impl EddyExchange {
    /// 建立邻居表（集合操作）
    ///
    /// `reach` 为全局最大涡尺度。
    pub fn new(geometry: &PatchGeometry, reach: f64, comm: &dyn Communicator) -> TiResult<Self> {
        let rank = comm.rank();
        let bounds: Vec<Bounds2> = all_gather(comm, "dfsem.bounds", &geometry.local_bounds())?;
        let grown = bounds[rank].grow(glam::DVec2::splat(reach));
        let neighbours: Vec<usize> = bounds
            .iter()
            .enumerate()
            .filter(|(r, b)| {
                *r != rank
                    && geometry
                        .periodic_images(b)
                        .iter()
                        .any(|image| image.intersects(&grown))
            })
            .map(|(r, _)| r)
            .collect();
        if !neighbours.is_empty() {
            log::debug!("DFSEM: rank {rank} 的邻居 {neighbours:?}");
        }
        Ok(Self {
            rank,
            bounds,
            neighbours,
        })
    }

    /// 邻居进程
    pub fn neighbours(&self) -> &[usize] {
        &self.neighbours
    }

    /// 涡是否影响进程 `r` 的范围（含周期镜像）
    fn affects(&self, eddy: &Eddy, r: usize, geometry: &PatchGeometry) -> bool {
        geometry
            .periodic_images(&eddy.influence_box())
            .iter()
            .any(|image| image.intersects(&self.bounds[r]))
    }

    /// 交换涡副本（集合操作，单进程直接返回空表）
    pub fn exchange(
        &self,
        local: &[Eddy],
        geometry: &PatchGeometry,
        comm: &dyn Communicator,
    ) -> TiResult<Vec<Eddy>> {
        if comm.is_serial() {
            return Ok(Vec::new());
        }
        let outgoing: Vec<(usize, Vec<Eddy>)> = self
            .neighbours
            .iter()
            .map(|&r| {
                let copies: Vec<Eddy> = local
                    .iter()
                    .filter(|e| self.affects(e, r, geometry))
                    .copied()
                    .collect();
                (r, copies)
            })
            .filter(|(_, copies)| !copies.is_empty())
            .collect();
        let received = exchange(comm, "dfsem.eddies", outgoing)?;
        let remote: Vec<Eddy> = received.into_iter().flat_map(|(_, e)| e).collect();
        log::debug!("DFSEM: rank {} 收到 {} 个远程涡", self.rank, remote.len());
        Ok(remote)
    }
}
