// crates/ti_inflow/src/patch.rs

//! 入口边界几何与局部坐标系
//!
//! # 局部坐标系
//!
//! ```text
//! e_x = −⟨n⟩              （流向，指向计算域内部）
//! e_z = e_x × N           （给定 lateral_axis = N 时）
//!     = (sinβ N_y, −sinβ N_x, cosβ)   （e_x ∥ N 时）
//!     = (0, 0, 1)         （缺省）
//! e_y = e_z × e_x
//! ```
//!
//! `e_z` 随后对 `e_x` 正交化。面在局部坐标下只保留横向坐标 `(y, z)`，
//! 入口平面取 `x = 0`。
//!
//! # 全局量
//!
//! 总面积、全局面数、全局横向范围与平均法向均经集合操作得到，
//! 所有进程看到相同的值。

use glam::{DMat3, DVec2, DVec3};
use ti_foundation::float::{safe_div, KahanSum, MIN_AREA};
use ti_foundation::{TiError, TiResult};

use crate::parallel::{all_gather, all_reduce_count, all_reduce_sum, Communicator};
use crate::random::RandomSource;

/// 判断向量退化的阈值
const DEGENERATE_NORM: f64 = 1e-8;

// ============================================================
// 局部坐标系
// ============================================================

/// 边界局部坐标系（正交单位基）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchFrame {
    /// 流向
    pub e_x: DVec3,
    /// 第一横向
    pub e_y: DVec3,
    /// 第二横向
    pub e_z: DVec3,
}

impl PatchFrame {
    /// 由平均外法向构造
    ///
    /// `lateral_axis` 对应边界字典中的 `Naxis`，`beta_deg` 对应 `beta`（度）。
    pub fn new(mean_normal: DVec3, lateral_axis: Option<DVec3>, beta_deg: f64) -> TiResult<Self> {
        let e_x = (-mean_normal).normalize_or_zero();
        if e_x.length_squared() < 0.5 {
            return Err(TiError::config("patch", "平均法向为零，无法确定流向"));
        }

        let hint = match lateral_axis {
            Some(n) if n.length() > 0.0 => {
                let n = n.normalize();
                let cross = e_x.cross(n);
                if cross.length() > DEGENERATE_NORM {
                    cross
                } else {
                    let beta = beta_deg.to_radians();
                    DVec3::new(beta.sin() * n.y, -beta.sin() * n.x, beta.cos())
                }
            }
            _ => DVec3::Z,
        };

        let mut e_z = hint - hint.dot(e_x) * e_x;
        if e_z.length() < DEGENERATE_NORM {
            // 取与流向最不对齐的坐标轴
            let fallback = [DVec3::X, DVec3::Y, DVec3::Z]
                .into_iter()
                .min_by(|a, b| a.dot(e_x).abs().total_cmp(&b.dot(e_x).abs()))
                .unwrap_or(DVec3::Y);
            log::warn!("横向参考轴与流向平行，改用 {fallback:?}");
            e_z = fallback - fallback.dot(e_x) * e_x;
        }
        let e_z = e_z.normalize();
        let e_y = e_z.cross(e_x);
        Ok(Self { e_x, e_y, e_z })
    }

    /// 全局 → 局部
    #[inline]
    pub fn to_local(&self, v: DVec3) -> DVec3 {
        DVec3::new(v.dot(self.e_x), v.dot(self.e_y), v.dot(self.e_z))
    }

    /// 局部 → 全局
    #[inline]
    pub fn to_global(&self, v: DVec3) -> DVec3 {
        v.x * self.e_x + v.y * self.e_y + v.z * self.e_z
    }

    /// 局部 → 全局的旋转矩阵（列为基向量）
    pub fn rotation(&self) -> DMat3 {
        DMat3::from_cols(self.e_x, self.e_y, self.e_z)
    }
}

// ============================================================
// 横向包围盒
// ============================================================

/// 横向 (y, z) 轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds2 {
    /// 下角
    pub min: DVec2,
    /// 上角
    pub max: DVec2,
}

impl Bounds2 {
    /// 空包围盒（不含任何点）
    pub const EMPTY: Self = Self {
        min: DVec2::splat(f64::INFINITY),
        max: DVec2::splat(f64::NEG_INFINITY),
    };

    /// 构造
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// 扩展以包含以 `p` 为中心、半宽 `half` 的方块
    pub fn include(&mut self, p: DVec2, half: f64) {
        self.min = self.min.min(p - DVec2::splat(half));
        self.max = self.max.max(p + DVec2::splat(half));
    }

    /// 并集
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// 向外扩展
    pub fn grow(&self, margin: DVec2) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::new(self.min - margin, self.max + margin)
    }

    /// 平移
    pub fn translate(&self, offset: DVec2) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }

    /// 范围
    pub fn extent(&self) -> DVec2 {
        if self.is_empty() {
            DVec2::ZERO
        } else {
            self.max - self.min
        }
    }

    /// 是否包含点（闭区间）
    #[inline]
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// 是否相交（闭区间）
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// 钳制到盒内
    #[inline]
    pub fn clamp(&self, p: DVec2) -> DVec2 {
        p.clamp(self.min, self.max)
    }
}

// ============================================================
// 面数据输入
// ============================================================

/// 本进程的边界面数据（全局坐标）
#[derive(Debug, Clone, Default)]
pub struct PatchFaces {
    /// 面中心
    pub centres: Vec<DVec3>,
    /// 面积
    pub areas: Vec<f64>,
    /// 外法向（无需归一化）
    pub normals: Vec<DVec3>,
    /// 每个面的顶点（可为空，此时按 `±½√面积` 估计面的横向范围）
    pub vertices: Vec<Vec<DVec3>>,
}

impl PatchFaces {
    /// `x = 0` 平面上的 `ny × nz` 矩形边界，外法向 `−x`
    ///
    /// 面按 y 优先排列：`index = j * ny + i`。
    pub fn rectangle(ny: usize, nz: usize, width: f64, height: f64) -> Self {
        let (dy, dz) = (width / ny as f64, height / nz as f64);
        let mut faces = Self::default();
        for j in 0..nz {
            for i in 0..ny {
                let (y0, z0) = (i as f64 * dy, j as f64 * dz);
                faces
                    .centres
                    .push(DVec3::new(0.0, y0 + 0.5 * dy, z0 + 0.5 * dz));
                faces.areas.push(dy * dz);
                faces.normals.push(-DVec3::X);
                faces.vertices.push(vec![
                    DVec3::new(0.0, y0, z0),
                    DVec3::new(0.0, y0 + dy, z0),
                    DVec3::new(0.0, y0 + dy, z0 + dz),
                    DVec3::new(0.0, y0, z0 + dz),
                ]);
            }
        }
        faces
    }

    /// 按连续块划分给 `size` 个进程，返回第 `rank` 块
    pub fn split(&self, rank: usize, size: usize) -> Self {
        let n = self.len();
        let per = n / size;
        let rest = n % size;
        let start = rank * per + rank.min(rest);
        let end = start + per + usize::from(rank < rest);
        Self {
            centres: self.centres[start..end].to_vec(),
            areas: self.areas[start..end].to_vec(),
            normals: self.normals[start..end].to_vec(),
            vertices: if self.vertices.is_empty() {
                Vec::new()
            } else {
                self.vertices[start..end].to_vec()
            },
        }
    }

    /// 面数
    pub fn len(&self) -> usize {
        self.centres.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }

    fn validate(&self) -> TiResult<()> {
        let n = self.centres.len();
        if self.areas.len() != n {
            return Err(TiError::size_mismatch("areas", n, self.areas.len()));
        }
        if self.normals.len() != n {
            return Err(TiError::size_mismatch("normals", n, self.normals.len()));
        }
        if !self.vertices.is_empty() && self.vertices.len() != n {
            return Err(TiError::size_mismatch("vertices", n, self.vertices.len()));
        }
        if let Some(i) = self.areas.iter().position(|&a| !(a > MIN_AREA) || !a.is_finite()) {
            return Err(TiError::config(
                "patch",
                format!("面 {i} 的面积 {} 非法", self.areas[i]),
            ));
        }
        if let Some(i) = self.centres.iter().position(|c| !c.is_finite()) {
            return Err(TiError::config("patch", format!("面 {i} 的中心坐标非有限")));
        }
        Ok(())
    }
}

// ============================================================
// 边界几何
// ============================================================

/// 入口边界几何（本进程部分 + 全局汇总量）
#[derive(Debug, Clone)]
pub struct PatchGeometry {
    frame: PatchFrame,
    lateral: Vec<DVec2>,
    areas: Vec<f64>,
    local_bounds: Bounds2,
    global_bounds: Bounds2,
    total_area: f64,
    n_faces_global: usize,
    periodic: [bool; 2],
}

impl PatchGeometry {
    /// 构造并执行全局归约（集合操作，所有进程须同时调用）
    pub fn new(
        faces: &PatchFaces,
        periodic: [bool; 2],
        lateral_axis: Option<DVec3>,
        beta_deg: f64,
        comm: &dyn Communicator,
    ) -> TiResult<Self> {
        faces.validate()?;

        let local_normal = faces
            .normals
            .iter()
            .zip(&faces.areas)
            .fold(DVec3::ZERO, |acc, (n, &a)| acc + n.normalize_or_zero() * a);
        let mean_normal = all_gather(comm, "patch.normal", &local_normal.to_array())?
            .into_iter()
            .fold(DVec3::ZERO, |acc, v| acc + DVec3::from_array(v));
        let frame = PatchFrame::new(mean_normal, lateral_axis, beta_deg)?;

        let lateral: Vec<DVec2> = faces
            .centres
            .iter()
            .map(|&c| {
                let l = frame.to_local(c);
                DVec2::new(l.y, l.z)
            })
            .collect();

        let mut local_bounds = Bounds2::EMPTY;
        for (i, (p, &a)) in lateral.iter().zip(&faces.areas).enumerate() {
            match faces.vertices.get(i) {
                Some(vertices) if !vertices.is_empty() => {
                    for &v in vertices {
                        let l = frame.to_local(v);
                        local_bounds.include(DVec2::new(l.y, l.z), 0.0);
                    }
                }
                _ => local_bounds.include(*p, 0.5 * a.sqrt()),
            }
        }
        let global_bounds = all_gather(comm, "patch.bounds", &local_bounds)?
            .iter()
            .fold(Bounds2::EMPTY, |acc, b| acc.union(b));
        if global_bounds.is_empty() {
            return Err(TiError::config("patch", "所有进程上入口边界都没有面"));
        }

        let total_area = all_reduce_sum(comm, "patch.area", KahanSum::sum_iter(faces.areas.iter().copied()))?;
        let n_faces_global = all_reduce_count(comm, "patch.faces", faces.len())?;

        log::info!(
            "入口边界: {} 个面（全局 {}），总面积 {:.6e}，流向 {:?}",
            faces.len(),
            n_faces_global,
            total_area,
            frame.e_x
        );

        Ok(Self {
            frame,
            lateral,
            areas: faces.areas.clone(),
            local_bounds,
            global_bounds,
            total_area,
            n_faces_global,
            periodic,
        })
    }

    /// 局部坐标系
    pub fn frame(&self) -> &PatchFrame {
        &self.frame
    }

    /// 本进程面数
    pub fn n_faces(&self) -> usize {
        self.lateral.len()
    }

    /// 全局面数
    pub fn n_faces_global(&self) -> usize {
        self.n_faces_global
    }

    /// 面的横向坐标
    pub fn lateral(&self) -> &[DVec2] {
        &self.lateral
    }

    /// 面积
    pub fn areas(&self) -> &[f64] {
        &self.areas
    }

    /// 本进程面积
    pub fn local_area(&self) -> f64 {
        KahanSum::sum_iter(self.areas.iter().copied())
    }

    /// 全局总面积
    pub fn total_area(&self) -> f64 {
        self.total_area
    }

    /// 全局平均面积
    pub fn mean_area(&self) -> f64 {
        safe_div(self.total_area, self.n_faces_global as f64, 0.0)
    }

    /// 本进程横向范围
    pub fn local_bounds(&self) -> Bounds2 {
        self.local_bounds
    }

    /// 全局横向范围
    pub fn global_bounds(&self) -> Bounds2 {
        self.global_bounds
    }

    /// 周期性标志 `[y, z]`
    pub fn periodic(&self) -> [bool; 2] {
        self.periodic
    }

    /// 全局横向跨度
    pub fn span(&self) -> DVec2 {
        self.global_bounds.extent()
    }

    /// 包围盒对角线长度
    pub fn diagonal(&self) -> f64 {
        self.span().length()
    }

    /// 把点折回周期方向的全局范围内
    pub fn wrap(&self, mut p: DVec2) -> DVec2 {
        let span = self.span();
        for d in 0..2 {
            if self.periodic[d] && span[d] > 0.0 {
                let lo = self.global_bounds.min[d];
                p[d] = lo + (p[d] - lo).rem_euclid(span[d]);
            }
        }
        p
    }

    /// 周期方向的最小镜像距离
    #[inline]
    pub fn min_image(&self, mut d: DVec2) -> DVec2 {
        let span = self.span();
        for k in 0..2 {
            if self.periodic[k] && span[k] > 0.0 {
                d[k] -= span[k] * (d[k] / span[k]).round();
            }
        }
        d
    }

    /// 包围盒在周期方向上的镜像（含自身）
    pub fn periodic_images(&self, b: &Bounds2) -> Vec<Bounds2> {
        let span = self.span();
        let shifts_y: &[f64] = if self.periodic[0] { &[-1.0, 0.0, 1.0] } else { &[0.0] };
        let shifts_z: &[f64] = if self.periodic[1] { &[-1.0, 0.0, 1.0] } else { &[0.0] };
        let mut images = Vec::with_capacity(shifts_y.len() * shifts_z.len());
        for &sy in shifts_y {
            for &sz in shifts_z {
                images.push(b.translate(DVec2::new(sy * span.x, sz * span.y)));
            }
        }
        images
    }

    /// 对查询点施加一次性随机横向扰动
    ///
    /// 偏移幅值不超过 `perturb × 包围盒对角线`，用于打破规则网格上的对称性。
    pub fn perturb(&mut self, perturb: f64, rng: &mut RandomSource) {
        if perturb <= 0.0 {
            return;
        }
        let amplitude = perturb * self.diagonal() / std::f64::consts::SQRT_2;
        for p in &mut self.lateral {
            let offset = DVec2::new(
                rng.uniform_range(-amplitude, amplitude),
                rng.uniform_range(-amplitude, amplitude),
            );
            *p += offset;
        }
    }
}
