// crates/ti_inflow/src/random.rs

//! 随机数源
//!
//! 每个进程持有一个独立、可复现的随机流：
//!
//! ```text
//! ChaCha8(seed = base_seed) + stream = rank
//! ```
//!
//! ChaCha 的 stream 号互不重叠，因此不同进程的随机数不会相关；
//! 对固定的进程数与种子，结果逐位可复现。
//!
//! 生成器状态（种子、stream、字位置）可完整导出，用于重启时逐位续算。

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// 可序列化的随机数生成器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    /// 256 位种子
    pub seed: [u8; 32],
    /// stream 号
    pub stream: u64,
    /// 字位置高 64 位
    pub word_pos_hi: u64,
    /// 字位置低 64 位
    pub word_pos_lo: u64,
}

impl RngState {
    fn word_pos(&self) -> u128 {
        ((self.word_pos_hi as u128) << 64) | self.word_pos_lo as u128
    }
}

/// 确定性随机数源
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: ChaCha8Rng,
}

impl RandomSource {
    /// 按基础种子与进程号创建
    pub fn new(base_seed: u64, rank: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
        rng.set_stream(rank as u64);
        Self { rng }
    }

    /// 按基础种子、进程号与面/涡编号创建独立流
    pub fn for_index(base_seed: u64, rank: usize, index: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(base_seed ^ splitmix64(index.wrapping_add(1)));
        rng.set_stream(rank as u64);
        Self { rng }
    }

    /// 由导出的状态恢复
    pub fn from_state(state: &RngState) -> Self {
        let mut rng = ChaCha8Rng::from_seed(state.seed);
        rng.set_stream(state.stream);
        rng.set_word_pos(state.word_pos());
        Self { rng }
    }

    /// 导出当前状态
    pub fn state(&self) -> RngState {
        let pos = self.rng.get_word_pos();
        RngState {
            seed: self.rng.get_seed(),
            stream: self.rng.get_stream(),
            word_pos_hi: (pos >> 64) as u64,
            word_pos_lo: pos as u64,
        }
    }

    /// [0, 1) 均匀分布
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// [lo, hi) 均匀分布
    #[inline]
    pub fn uniform_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.uniform()
    }

    /// 标准正态分布（零均值、单位方差）
    #[inline]
    pub fn normal(&mut self) -> f64 {
        self.rng.sample::<f64, _>(StandardNormal)
    }

    /// 三个独立标准正态分量
    #[inline]
    pub fn normal_vec3(&mut self) -> DVec3 {
        DVec3::new(self.normal(), self.normal(), self.normal())
    }

    /// 随机符号 ±1
    #[inline]
    pub fn sign(&mut self) -> f64 {
        if self.rng.gen::<bool>() {
            1.0
        } else {
            -1.0
        }
    }

    /// 三个独立随机符号
    #[inline]
    pub fn sign_vec3(&mut self) -> DVec3 {
        DVec3::new(self.sign(), self.sign(), self.sign())
    }

    /// 批量填充标准正态样本
    pub fn fill_normal(&mut self, buffer: &mut [f64]) {
        for v in buffer.iter_mut() {
            *v = self.normal();
        }
    }

    /// 按权重（累积和）抽取下标
    ///
    /// `cumulative` 为单调非减的累积权重，末元素为总权重。
    pub fn pick_weighted(&mut self, cumulative: &[f64]) -> Option<usize> {
        let total = *cumulative.last()?;
        if !(total > 0.0) {
            return None;
        }
        let target = self.uniform() * total;
        let idx = cumulative.partition_point(|&c| c <= target);
        Some(idx.min(cumulative.len() - 1))
    }
}

/// SplitMix64 混合函数，用于派生子种子
#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
