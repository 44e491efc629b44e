// crates/ti_inflow/src/numerics/bessel.rs

//! 零阶修正 Bessel 函数
//!
//! 多项式逼近（Abramowitz & Stegun 9.8.1–9.8.6），相对误差约 1e-7。
//!
//! 用途：指数相关滤波器的一维核正比于 `K0(|x|/ℓ)`，
//! 其自卷积恰为 `exp(-|r|/ℓ)`。

use ti_foundation::{TiError, TiResult};

/// `I0` 直接求值的上限，超过后 `exp(x)` 溢出
pub const I0_MAX_ARGUMENT: f64 = 700.0;

/// 第一类零阶修正 Bessel 函数 `I0(x)`
pub fn bessel_i0(x: f64) -> TiResult<f64> {
    if !x.is_finite() || x.abs() > I0_MAX_ARGUMENT {
        return Err(TiError::numerical(
            "bessel_i0",
            format!("参数 {x} 超出支持范围 |x| <= {I0_MAX_ARGUMENT}"),
        ));
    }
    let ax = x.abs();
    if ax < 3.75 {
        Ok(i0_small(x))
    } else {
        Ok(ax.exp() / ax.sqrt() * i0_large_poly(ax))
    }
}

/// 指数缩放的 `e^{-|x|} I0(x)`，对大参数不溢出
pub fn bessel_i0_scaled(x: f64) -> TiResult<f64> {
    if !x.is_finite() {
        return Err(TiError::numerical("bessel_i0_scaled", format!("参数 {x} 非有限")));
    }
    let ax = x.abs();
    if ax < 3.75 {
        Ok((-ax).exp() * i0_small(x))
    } else {
        Ok(i0_large_poly(ax) / ax.sqrt())
    }
}

/// 第二类零阶修正 Bessel 函数 `K0(x)`，要求 `x > 0`
pub fn bessel_k0(x: f64) -> TiResult<f64> {
    if !(x > 0.0) || !x.is_finite() {
        return Err(TiError::numerical(
            "bessel_k0",
            format!("参数 {x} 超出支持范围 (0, ∞)"),
        ));
    }
    if x <= 2.0 {
        let y = x * x / 4.0;
        let poly = -0.577_215_66
            + y * (0.422_784_20
                + y * (0.230_697_56
                    + y * (0.034_885_90 + y * (0.002_626_98 + y * (0.000_107_50 + y * 0.000_007_4)))));
        Ok(-(x / 2.0).ln() * i0_small(x) + poly)
    } else {
        let y = 2.0 / x;
        let poly = 1.253_314_14
            + y * (-0.078_323_58
                + y * (0.021_895_68
                    + y * (-0.010_624_46 + y * (0.005_878_72 + y * (-0.002_515_40 + y * 0.000_532_08)))));
        Ok((-x).exp() / x.sqrt() * poly)
    }
}

#[inline]
fn i0_small(x: f64) -> f64 {
    let y = (x / 3.75).powi(2);
    1.0 + y
        * (3.515_622_9
            + y * (3.089_942_4
                + y * (1.206_749_2 + y * (0.265_973_2 + y * (0.036_076_8 + y * 0.004_581_3)))))
}

#[inline]
fn i0_large_poly(ax: f64) -> f64 {
    let y = 3.75 / ax;
    0.398_942_28
        + y * (0.013_285_92
            + y * (0.002_253_19
                + y * (-0.001_575_65
                    + y * (0.009_162_81
                        + y * (-0.020_577_06
                            + y * (0.026_355_37 + y * (-0.016_476_33 + y * 0.003_923_77)))))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(a: f64, b: f64) -> f64 {
        (a - b).abs() / b.abs()
    }

    #[test]
    fn test_i0_reference_values() {
        assert!((bessel_i0(0.0).unwrap() - 1.0).abs() < 1e-12);
        assert!(rel(bessel_i0(1.0).unwrap(), 1.266_065_877_752_008) < 1e-6);
        assert!(rel(bessel_i0(5.0).unwrap(), 27.239_871_823_604_44) < 1e-6);
        assert!(rel(bessel_i0(-2.0).unwrap(), 2.279_585_302_336_067) < 1e-6);
    }

    #[test]
    fn test_i0_scaled_consistent() {
        for &x in &[0.5, 3.0, 4.0, 20.0] {
            let direct = bessel_i0(x).unwrap() * (-x).exp();
            assert!(rel(bessel_i0_scaled(x).unwrap(), direct) < 1e-12);
        }
        // 大参数不溢出
        let big = bessel_i0_scaled(5000.0).unwrap();
        assert!(big.is_finite() && big > 0.0);
        assert!(bessel_i0(5000.0).is_err());
    }

    #[test]
    fn test_k0_reference_values() {
        assert!(rel(bessel_k0(0.1).unwrap(), 2.427_069_024_702_017) < 1e-6);
        assert!(rel(bessel_k0(1.0).unwrap(), 0.421_024_438_240_708_3) < 1e-6);
        assert!(rel(bessel_k0(3.0).unwrap(), 0.034_739_504_386_279_4) < 1e-6);
    }

    #[test]
    fn test_k0_out_of_range() {
        assert!(matches!(bessel_k0(0.0), Err(TiError::Numerical { .. })));
        assert!(bessel_k0(-1.0).is_err());
        assert!(bessel_k0(f64::NAN).is_err());
    }

    #[test]
    fn test_k0_monotone_decreasing() {
        let mut prev = f64::INFINITY;
        for i in 1..60 {
            let v = bessel_k0(i as f64 * 0.1).unwrap();
            assert!(v < prev);
            prev = v;
        }
    }
}
