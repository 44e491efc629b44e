// crates/ti_inflow/src/dfm/grid.rs

//! DFM 虚拟网格
//!
//! 覆盖入口边界的 `My × Mz` 均匀网格，三个速度分量各一套独立白噪声。
//! 非周期方向带宽度为最大滤波半宽的晕层；周期方向无晕层，按模取下标。
//!
//! ```text
//!        ┌──────── halo ────────┐
//!        │  ┌────────────────┐  │
//!        │  │   My × Mz      │  │   下标 (j, k)，j ∈ [−hy, My+hy)
//!        │  └────────────────┘  │
//!        └──────────────────────┘
//! ```
//!
//! 多进程时样本按连续块分给各进程（`indices_per_proc` + `rest`），
//! 每个进程用自己的随机流抽样，全收集后所有进程看到相同的网格。

use glam::DVec2;
use ti_foundation::{TiError, TiResult};

use crate::parallel::{all_gather, Communicator};
use crate::patch::PatchGeometry;
use crate::random::RandomSource;

/// 虚拟网格布局
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    /// 网格下角（局部横向坐标）
    pub origin: DVec2,
    /// 网格间距
    pub spacing: DVec2,
    /// 单元数 `[My, Mz]`
    pub cells: [usize; 2],
    /// 晕层宽度
    pub halo: [usize; 2],
    /// 周期性
    pub periodic: [bool; 2],
}

impl GridLayout {
    /// 由边界几何构造（不含晕层）
    ///
    /// 间距 `Δ = grid_factor · √(平均面积)`；周期方向把间距调整为
    /// `span / M`，使周期恰为整数个单元。
    pub fn new(geometry: &PatchGeometry, grid_factor: f64) -> TiResult<Self> {
        let delta = grid_factor * geometry.mean_area().sqrt();
        if !(delta > 0.0) || !delta.is_finite() {
            return Err(TiError::config("dfm.grid_factor", format!("虚拟网格间距 {delta} 非法")));
        }
        let span = geometry.span();
        let periodic = geometry.periodic();
        let mut cells = [1usize; 2];
        let mut spacing = DVec2::splat(delta);
        for d in 0..2 {
            cells[d] = ((span[d] / delta).ceil() as usize).max(1);
            if periodic[d] {
                spacing[d] = span[d] / cells[d] as f64;
            }
        }
        Ok(Self {
            origin: geometry.global_bounds().min,
            spacing,
            cells,
            halo: [0, 0],
            periodic,
        })
    }

    /// 设置晕层（周期方向恒为 0）
    pub fn with_halo(mut self, halo: [usize; 2]) -> Self {
        for d in 0..2 {
            self.halo[d] = if self.periodic[d] { 0 } else { halo[d] };
        }
        self
    }

    /// 每个方向的存储长度
    pub fn stored(&self) -> [usize; 2] {
        [
            self.cells[0] + 2 * self.halo[0],
            self.cells[1] + 2 * self.halo[1],
        ]
    }

    /// 每个分量的样本数
    pub fn n_samples(&self) -> usize {
        let s = self.stored();
        s[0] * s[1]
    }

    /// 点所在单元（钳制到网格内）
    pub fn cell_of(&self, p: DVec2) -> (usize, usize) {
        let rel = (p - self.origin) / self.spacing;
        let clamp = |v: f64, m: usize| (v.floor().max(0.0) as usize).min(m - 1);
        (clamp(rel.x, self.cells[0]), clamp(rel.y, self.cells[1]))
    }

    /// 方向 `d` 上单元下标 `j` 对应的存储下标
    #[inline]
    pub fn axis_index(&self, d: usize, j: isize) -> usize {
        if self.periodic[d] {
            j.rem_euclid(self.cells[d] as isize) as usize
        } else {
            let idx = j + self.halo[d] as isize;
            debug_assert!(idx >= 0 && (idx as usize) < self.stored()[d]);
            idx as usize
        }
    }

    /// 单元 `(j, k)` 的线性存储下标（y 优先）
    #[inline]
    pub fn index(&self, j: isize, k: isize) -> usize {
        self.axis_index(1, k) * self.stored()[0] + self.axis_index(0, j)
    }
}

/// 三分量白噪声虚拟网格
#[derive(Debug, Clone)]
pub struct VirtualGrid {
    layout: GridLayout,
    data: [Vec<f64>; 3],
}

impl VirtualGrid {
    /// 全零网格
    pub fn new(layout: GridLayout) -> Self {
        let n = layout.n_samples();
        Self {
            layout,
            data: [vec![0.0; n], vec![0.0; n], vec![0.0; n]],
        }
    }

    /// 布局
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// 原始数据
    pub fn data(&self) -> &[Vec<f64>; 3] {
        &self.data
    }

    /// 重新抽取白噪声（集合操作）
    pub fn redraw(&mut self, rng: &mut RandomSource, comm: &dyn Communicator) -> TiResult<()> {
        let n = self.layout.n_samples();
        let total = 3 * n;

        let samples = if comm.is_serial() {
            let mut all = vec![0.0; total];
            rng.fill_normal(&mut all);
            all
        } else {
            let size = comm.size();
            let rank = comm.rank();
            let indices_per_proc = total / size;
            let rest = total % size;
            let count = indices_per_proc + usize::from(rank < rest);
            let mut chunk = vec![0.0; count];
            rng.fill_normal(&mut chunk);
            let all: Vec<f64> = all_gather(comm, "dfm.grid", &chunk)?
                .into_iter()
                .flatten()
                .collect();
            if all.len() != total {
                return Err(TiError::parallel(format!(
                    "虚拟网格样本数 {} 与期望 {total} 不一致",
                    all.len()
                )));
            }
            all
        };

        for (c, slot) in self.data.iter_mut().enumerate() {
            slot.copy_from_slice(&samples[c * n..(c + 1) * n]);
        }
        Ok(())
    }

    /// 分量 `component` 在单元 `(j, k)` 的样本
    #[inline]
    pub fn get(&self, component: usize, j: isize, k: isize) -> f64 {
        self.data[component][self.layout.index(j, k)]
    }

    /// 用给定数据覆盖（冻结网格的恢复）
    pub fn fill_from(&mut self, data: [Vec<f64>; 3]) -> TiResult<()> {
        let n = self.layout.n_samples();
        if let Some(bad) = data.iter().find(|d| d.len() != n) {
            return Err(TiError::size_mismatch("virtual grid", n, bad.len()));
        }
        self.data = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{LocalWorld, SerialComm};
    use crate::patch::PatchFaces;

    fn layout(periodic: [bool; 2], comm: &dyn Communicator) -> GridLayout {
        let faces = PatchFaces::rectangle(8, 4, 2.0, 1.0);
        let local = faces.split(comm.rank(), comm.size());
        let geom = PatchGeometry::new(&local, periodic, None, 0.0, comm).unwrap();
        GridLayout::new(&geom, 1.0).unwrap()
    }

    #[test]
    fn test_layout_matches_face_grid() {
        let l = layout([false, false], &SerialComm).with_halo([3, 2]);
        assert_eq!(l.cells, [8, 4]);
        assert_eq!(l.stored(), [14, 8]);
        assert_eq!(l.cell_of(DVec2::new(0.37, 0.9)), (1, 3));
        assert_eq!(l.cell_of(DVec2::new(-5.0, 5.0)), (0, 3));
    }

    #[test]
    fn test_periodic_axis_has_no_halo() {
        let l = layout([true, false], &SerialComm).with_halo([3, 2]);
        assert_eq!(l.halo, [0, 2]);
        assert_eq!(l.axis_index(0, -1), 7);
        assert_eq!(l.axis_index(0, 8), 0);
        assert_eq!(l.index(-1, 0), l.index(7, 0));
    }

    #[test]
    fn test_redraw_and_fill() {
        let mut grid = VirtualGrid::new(layout([false, false], &SerialComm).with_halo([1, 1]));
        let mut rng = RandomSource::new(3, 0);
        grid.redraw(&mut rng, &SerialComm).unwrap();
        let first = grid.get(0, 0, 0);
        assert_ne!(first, 0.0);
        assert_ne!(grid.get(0, 0, 0), grid.get(1, 0, 0));

        let saved = grid.data().clone();
        grid.redraw(&mut rng, &SerialComm).unwrap();
        assert_ne!(grid.get(0, 0, 0), first);
        grid.fill_from(saved).unwrap();
        assert_eq!(grid.get(0, 0, 0), first);
        assert!(grid.fill_from([vec![], vec![], vec![]]).is_err());
    }

    #[test]
    fn test_parallel_ranks_share_grid() {
        let grids = LocalWorld::run(3, |comm| {
            let mut grid = VirtualGrid::new(layout([false, true], &comm).with_halo([2, 2]));
            let mut rng = RandomSource::new(17, comm.rank());
            grid.redraw(&mut rng, &comm).unwrap();
            grid.data().clone()
        });
        assert_eq!(grids[0], grids[1]);
        assert_eq!(grids[1], grids[2]);
    }
}
