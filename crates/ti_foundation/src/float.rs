// crates/ti_foundation/src/float.rs

//! 安全浮点运算
//!
//! 安全除法/开方，以及用于全局面积等累加量的 Kahan 求和。

/// 安全除法阈值
pub const SAFE_DIV_EPSILON: f64 = 1e-14;

/// 最小面面积 [m²]
pub const MIN_AREA: f64 = 1e-12;

// ============================================================================
// 辅助函数
// ============================================================================

/// 安全除法（分母接近零或结果非有限时返回 fallback）
#[inline]
pub fn safe_div(a: f64, b: f64, fallback: f64) -> f64 {
    if b.abs() < SAFE_DIV_EPSILON {
        fallback
    } else {
        let result = a / b;
        if result.is_finite() {
            result
        } else {
            fallback
        }
    }
}

/// 安全平方根（负数截断为 0）
#[inline]
pub fn safe_sqrt(x: f64) -> f64 {
    x.max(0.0).sqrt()
}

// ============================================================================
// Kahan 求和算法
// ============================================================================

/// Kahan 求和器
///
/// 维护补偿项以减少大量小量累加时的舍入误差。
///
/// ```
/// use ti_foundation::float::KahanSum;
///
/// let mut sum = KahanSum::new();
/// for _ in 0..10000 {
///     sum.add(0.1);
/// }
/// assert!((sum.value() - 1000.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    /// 创建零值求和器
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加一个值
    #[inline]
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// 当前和
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum
    }

    /// 对迭代器求和
    pub fn sum_iter<I: IntoIterator<Item = f64>>(iter: I) -> f64 {
        let mut acc = Self::new();
        for v in iter {
            acc.add(v);
        }
        acc.value()
    }
}
