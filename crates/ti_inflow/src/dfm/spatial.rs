// crates/ti_inflow/src/dfm/spatial.rs

//! DFM 空间相关
//!
//! 面 `f` 落在单元 `(j0, k0)`，分量 `c` 的相关样本为
//!
//! ```text
//! u_c(f) = Σ_j Σ_k b_y[j] b_z[k] r_c(j0 + j, k0 + k)
//! ```
//!
//! 按可分离性分两遍计算：
//!
//! 1. 行遍：对每个不同的 (分量, y 核) 组合，沿 y 滤波整张网格
//! 2. 列遍：每个面沿 z 对行遍结果做一次一维卷积
//!
//! 复杂度 `O(网格 · K + 面数 · K)`。两遍都用 rayon 并行，不抽随机数。

use glam::DVec3;
use rayon::prelude::*;
use std::collections::HashMap;
use ti_config::DfmConfig;
use ti_foundation::TiResult;

use super::grid::{GridLayout, VirtualGrid};
use super::kernel::FilterKernel;
use crate::fields::LengthScaleField;
use crate::parallel::{all_reduce_max, Communicator};
use crate::patch::PatchGeometry;

/// 每个面、每个分量使用的 (行遍编号, z 核编号)
type FaceKernels = [(usize, usize); 3];

/// 空间相关器
#[derive(Debug, Clone)]
pub struct SpatialCorrelator {
    layout: GridLayout,
    cells: Vec<(usize, usize)>,
    kernels: Vec<FilterKernel>,
    row_passes: Vec<(usize, usize)>,
    face_kernels: Vec<FaceKernels>,
}

impl SpatialCorrelator {
    /// 构造（集合操作：晕层宽度取全局最大）
    pub fn new(
        geometry: &PatchGeometry,
        lengths: &LengthScaleField,
        config: &DfmConfig,
        comm: &dyn Communicator,
    ) -> TiResult<Self> {
        let base = GridLayout::new(geometry, config.grid_factor)?;
        let width_ratio = config.width_ratio();

        let mut kernels: Vec<FilterKernel> = Vec::new();
        let mut kernel_of: HashMap<usize, usize> = HashMap::new();
        let mut row_passes: Vec<(usize, usize)> = Vec::new();
        let mut pass_of: HashMap<(usize, usize), usize> = HashMap::new();
        let mut face_kernels = Vec::with_capacity(geometry.n_faces());
        let mut clamped = 0usize;

        let mut kernel_index = |n: usize, kernels: &mut Vec<FilterKernel>| -> TiResult<usize> {
            if let Some(&i) = kernel_of.get(&n) {
                return Ok(i);
            }
            kernels.push(FilterKernel::new(config.filter, n, width_ratio)?);
            kernel_of.insert(n, kernels.len() - 1);
            Ok(kernels.len() - 1)
        };

        for face in 0..geometry.n_faces() {
            let mut fk = [(0, 0); 3];
            for (c, slot) in fk.iter_mut().enumerate() {
                let mut scale = |d: usize| {
                    let n = (lengths.component(face, c, d + 1) / base.spacing[d]).round() as usize;
                    if n == 0 {
                        clamped += 1;
                    }
                    n.max(1)
                };
                let (ny, nz) = (scale(0), scale(1));
                let iy = kernel_index(ny, &mut kernels)?;
                let iz = kernel_index(nz, &mut kernels)?;
                let pass = *pass_of.entry((c, iy)).or_insert_with(|| {
                    row_passes.push((c, iy));
                    row_passes.len() - 1
                });
                *slot = (pass, iz);
            }
            face_kernels.push(fk);
        }
        if clamped > 0 {
            log::warn!("DFM: {clamped} 个积分尺度小于一个虚拟网格间距，已截断为 1");
        }

        let local_halo = |axis: usize| {
            face_kernels
                .iter()
                .flat_map(|fk| fk.iter())
                .map(|&(pass, iz)| {
                    if axis == 0 {
                        kernels[row_passes[pass].1].half_width()
                    } else {
                        kernels[iz].half_width()
                    }
                })
                .max()
                .unwrap_or(0)
        };
        let hy = all_reduce_max(comm, "dfm.halo_y", local_halo(0) as f64)? as usize;
        let hz = all_reduce_max(comm, "dfm.halo_z", local_halo(1) as f64)? as usize;
        let layout = base.with_halo([hy, hz]);
        for (d, h) in [hy, hz].into_iter().enumerate() {
            if layout.periodic[d] && 2 * h + 1 > layout.cells[d] {
                log::warn!(
                    "DFM: 滤波核长度 {} 超过周期方向 {} 个单元，相关结构将被折叠",
                    2 * h + 1,
                    layout.cells[d]
                );
            }
        }

        let cells = geometry
            .lateral()
            .iter()
            .map(|&p| layout.cell_of(p))
            .collect();

        log::info!(
            "DFM 虚拟网格: {} × {}，间距 ({:.4e}, {:.4e})，晕层 ({}, {})，{} 个滤波核",
            layout.cells[0],
            layout.cells[1],
            layout.spacing.x,
            layout.spacing.y,
            layout.halo[0],
            layout.halo[1],
            kernels.len()
        );

        Ok(Self {
            layout,
            cells,
            kernels,
            row_passes,
            face_kernels,
        })
    }

    /// 网格布局（含晕层）
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// 不同滤波核的个数
    pub fn n_kernels(&self) -> usize {
        self.kernels.len()
    }

    /// 由白噪声网格计算各面的相关样本（各向同性、单位方差）
    pub fn correlate(&self, grid: &VirtualGrid) -> Vec<DVec3> {
        let layout = &self.layout;
        let sz = layout.stored()[1];
        let my = layout.cells[0];
        let (hz, mz) = (layout.halo[1] as isize, layout.cells[1] as isize);

        // 行遍：rows[pass][kk * my + j0]，kk 为 z 方向存储下标
        let rows: Vec<Vec<f64>> = self
            .row_passes
            .par_iter()
            .map(|&(c, iy)| {
                let ky = &self.kernels[iy];
                let h = ky.half_width() as isize;
                let mut out = vec![0.0; sz * my];
                for k in -hz..mz + hz {
                    let kk = layout.axis_index(1, k);
                    for j0 in 0..my as isize {
                        let mut acc = 0.0;
                        for j in -h..=h {
                            acc += ky.at(j) * grid.get(c, j0 + j, k);
                        }
                        out[kk * my + j0 as usize] = acc;
                    }
                }
                out
            })
            .collect();

        // 列遍
        self.cells
            .par_iter()
            .zip(self.face_kernels.par_iter())
            .map(|(&(j0, k0), fk)| {
                let mut u = [0.0; 3];
                for (c, &(pass, iz)) in fk.iter().enumerate() {
                    let kz = &self.kernels[iz];
                    let h = kz.half_width() as isize;
                    let row = &rows[pass];
                    let mut acc = 0.0;
                    for k in -h..=h {
                        let kk = layout.axis_index(1, k0 as isize + k);
                        acc += kz.at(k) * row[kk * my + j0];
                    }
                    u[c] = acc;
                }
                DVec3::from_array(u)
            })
            .collect()
    }
}
