// crates/ti_inflow/src/dfm/kernel.rs

//! DFM 空间滤波核
//!
//! 一维核长度为奇数 `2N+1`，归一化使 `Σ b_k² = 1`，
//! 从而单位方差白噪声经滤波后仍为单位方差。
//!
//! # 高斯核（Klein 等）
//!
//! ```text
//! b_k ∝ exp(−π k² / (2 n²)),   N = width_ratio · n
//! ```
//!
//! 滤波后自相关为 `exp(−π r² / (4 n²))`，积分尺度为 `n` 个网格。
//!
//! # 指数相关核（Xie & Castro）
//!
//! 自卷积为 `exp(−π|r| / (2n))` 的精确核正比于 `K0(π|x| / (2n))`。
//! `K0` 在原点对数奇异，系数取网格单元 `[k−½, k+½]` 上的中点平均。

use ti_config::FilterShape;
use ti_foundation::TiResult;

use crate::numerics::bessel::bessel_k0;

/// 归一化前系数的下限（相对中心系数）
pub const MIN_FILTER_COEFF: f64 = 1e-15;

/// 指数核单元平均的采样点数
const CELL_SAMPLES: usize = 16;

/// 一维滤波核
#[derive(Debug, Clone, PartialEq)]
pub struct FilterKernel {
    shape: FilterShape,
    n: usize,
    coeffs: Vec<f64>,
}

impl FilterKernel {
    /// 按形状构造
    ///
    /// `n` 为以网格间距计的积分尺度，小于 1 时截断为 1。
    pub fn new(shape: FilterShape, n: usize, width_ratio: f64) -> TiResult<Self> {
        match shape {
            FilterShape::Gaussian => Ok(Self::gaussian(n, width_ratio)),
            FilterShape::Exponential => Self::exponential(n, width_ratio),
        }
    }

    /// 高斯核
    pub fn gaussian(n: usize, width_ratio: f64) -> Self {
        let n = clamp_scale(n);
        let half = half_width(n, width_ratio);
        let nf = n as f64;
        let raw: Vec<f64> = (-(half as isize)..=half as isize)
            .map(|k| {
                let k = k as f64;
                (-std::f64::consts::PI * k * k / (2.0 * nf * nf)).exp()
            })
            .collect();
        Self::normalized(FilterShape::Gaussian, n, raw)
    }

    /// 指数相关核
    pub fn exponential(n: usize, width_ratio: f64) -> TiResult<Self> {
        let n = clamp_scale(n);
        let half = half_width(n, width_ratio);
        let a = std::f64::consts::PI / (2.0 * n as f64);
        let raw = (-(half as isize)..=half as isize)
            .map(|k| {
                let mut acc = 0.0;
                for m in 0..CELL_SAMPLES {
                    let x = k as f64 - 0.5 + (m as f64 + 0.5) / CELL_SAMPLES as f64;
                    acc += bessel_k0(a * x.abs())?;
                }
                Ok(acc / CELL_SAMPLES as f64)
            })
            .collect::<TiResult<Vec<f64>>>()?;
        Ok(Self::normalized(FilterShape::Exponential, n, raw))
    }

    fn normalized(shape: FilterShape, n: usize, mut raw: Vec<f64>) -> Self {
        let peak = raw.iter().cloned().fold(0.0_f64, f64::max);
        let floor = MIN_FILTER_COEFF * peak;
        let mut clamped = 0;
        for b in raw.iter_mut() {
            if *b < floor {
                *b = floor;
                clamped += 1;
            }
        }
        if clamped > 0 {
            log::warn!("滤波核 (n = {n}) 有 {clamped} 个系数下溢，已截断为 {floor:e}");
        }
        let norm = raw.iter().map(|b| b * b).sum::<f64>().sqrt();
        for b in raw.iter_mut() {
            *b /= norm;
        }
        Self {
            shape,
            n,
            coeffs: raw,
        }
    }

    /// 系数（下标 0 对应偏移 `−N`）
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// 半宽 `N`
    pub fn half_width(&self) -> usize {
        self.coeffs.len() / 2
    }

    /// 积分尺度 `n`
    pub fn scale(&self) -> usize {
        self.n
    }

    /// 形状
    pub fn shape(&self) -> FilterShape {
        self.shape
    }

    /// 偏移 `k ∈ [−N, N]` 处的系数
    #[inline]
    pub fn at(&self, k: isize) -> f64 {
        self.coeffs[(k + self.half_width() as isize) as usize]
    }

    /// `Σ b_k²`
    pub fn sum_sq(&self) -> f64 {
        self.coeffs.iter().map(|b| b * b).sum()
    }

    /// 离散自相关 `Σ_k b_k b_{k+r}`
    pub fn autocorrelation(&self, r: usize) -> f64 {
        self.coeffs
            .iter()
            .zip(self.coeffs.iter().skip(r))
            .map(|(a, b)| a * b)
            .sum()
    }
}

fn clamp_scale(n: usize) -> usize {
    if n == 0 {
        log::warn!("积分尺度小于一个网格间距，截断为 1");
        1
    } else {
        n
    }
}

fn half_width(n: usize, width_ratio: f64) -> usize {
    ((width_ratio * n as f64).ceil() as usize).max(1)
}

/// 二维可分离核：两个一维核的外积
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel2D {
    /// y 方向核
    pub ky: FilterKernel,
    /// z 方向核
    pub kz: FilterKernel,
}

impl Kernel2D {
    /// 构造
    pub fn new(ky: FilterKernel, kz: FilterKernel) -> Self {
        Self { ky, kz }
    }

    /// 偏移 `(j, k)` 处的权重 `b_y[j] · b_z[k]`
    #[inline]
    pub fn weight(&self, j: isize, k: isize) -> f64 {
        self.ky.at(j) * self.kz.at(k)
    }

    /// 两个方向的半宽
    pub fn half_widths(&self) -> (usize, usize) {
        (self.ky.half_width(), self.kz.half_width())
    }
}
