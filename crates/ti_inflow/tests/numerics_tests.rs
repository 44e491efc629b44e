// crates/ti_inflow/tests/numerics_tests.rs
//!
//! 数值构件正确性测试
//!
//! Lund 分解、滤波核归一化与自相关、时间递推的方差保持

use glam::DVec3;
use ti_config::FilterShape;
use ti_foundation::SymmTensor;
use ti_inflow::dfm::{FilterKernel, TemporalCorrelator};
use ti_inflow::numerics::{lund_coefficients, LundTensor};
use ti_inflow::random::RandomSource;
use ti_inflow::InletFields;

// ============================================================
// Lund 分解
// ============================================================

/// 对称张量的六个独立分量
const PAIRS: [(usize, usize); 6] = [(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)];

/// 随机半正定张量 `A Aᵗ`
fn random_psd(rng: &mut RandomSource) -> SymmTensor {
    let a = [rng.normal_vec3(), rng.normal_vec3(), rng.normal_vec3()];
    let mut r = SymmTensor::ZERO;
    for col in a {
        r = r + SymmTensor::outer(col);
    }
    r
}

#[test]
fn test_lund_reconstructs_random_stresses() {
    let mut rng = RandomSource::new(42, 0);
    for i in 0..200 {
        let r = random_psd(&mut rng);
        let l = LundTensor::from_stress(&r, &format!("sample {i}")).unwrap();
        let back = l.reconstruct();
        let scale = r.max_abs();
        for (a, b) in PAIRS {
            assert!(
                (back.component(a, b) - r.component(a, b)).abs() < 1e-10 * scale,
                "sample {i} component ({a}, {b})"
            );
        }
        // L 的对角非负
        assert!(l.xx >= 0.0 && l.yy >= 0.0 && l.zz >= 0.0);
    }
}

#[test]
fn test_lund_rejects_indefinite_and_names_face() {
    let good = SymmTensor::isotropic(1.0);
    let bad = SymmTensor::new(1.0, 0.0, 0.0, -0.1, 0.0, 1.0);
    let err = lund_coefficients(&[good, good, bad]).unwrap_err();
    assert!(err.to_string().contains("face 2"), "{err}");
}

#[test]
fn test_lund_maps_unit_variance_to_target() {
    let r = SymmTensor::new(1.0, 0.3, -0.2, 0.5, 0.1, 0.4);
    let l = LundTensor::from_stress(&r, "cov").unwrap();
    let mut rng = RandomSource::new(7, 0);
    let n = 200_000;
    let mut acc = SymmTensor::ZERO;
    for _ in 0..n {
        let u = l.apply(rng.normal_vec3());
        acc = acc + SymmTensor::outer(u);
    }
    let cov = acc * (1.0 / n as f64);
    for (a, b) in PAIRS {
        assert!((cov.component(a, b) - r.component(a, b)).abs() < 0.02, "component ({a}, {b})");
    }
}

// ============================================================
// 滤波核
// ============================================================

#[test]
fn test_kernel_unit_energy_both_shapes() {
    for n in [1, 2, 3, 5, 8, 13] {
        for shape in [FilterShape::Gaussian, FilterShape::Exponential] {
            let k = FilterKernel::new(shape, n, shape.default_width_ratio()).unwrap();
            assert!((k.sum_sq() - 1.0).abs() < 1e-12, "{shape:?} n = {n}");
            assert_eq!(k.coeffs().len(), 2 * k.half_width() + 1);
        }
    }
}

/// 周期一维白噪声滤波
fn filter_periodic(kernel: &FilterKernel, noise: &[f64]) -> Vec<f64> {
    let m = noise.len() as isize;
    let h = kernel.half_width() as isize;
    (0..m)
        .map(|i| {
            (-h..=h)
                .map(|k| kernel.at(k) * noise[(i + k).rem_euclid(m) as usize])
                .sum()
        })
        .collect()
}

#[test]
fn test_gaussian_autocorrelation_decay() {
    let n = 4;
    let kernel = FilterKernel::gaussian(n, 2.0);
    let mut rng = RandomSource::new(2024, 0);
    let m = 4096;
    let lags = [0usize, 1, 2, 4, 6];
    let mut corr = [0.0; 5];
    let realisations = 20;
    let mut noise = vec![0.0; m];
    for _ in 0..realisations {
        rng.fill_normal(&mut noise);
        let u = filter_periodic(&kernel, &noise);
        for (slot, &r) in corr.iter_mut().zip(&lags) {
            *slot += (0..m).map(|i| u[i] * u[(i + r) % m]).sum::<f64>() / m as f64;
        }
    }
    for (c, &r) in corr.iter().zip(&lags) {
        let measured = c / realisations as f64;
        let expected = (-std::f64::consts::PI * (r * r) as f64 / (4.0 * (n * n) as f64)).exp();
        assert!(
            (measured - expected).abs() < 0.04,
            "lag {r}: measured {measured:.4}, expected {expected:.4}"
        );
    }
}

// ============================================================
// 时间递推
// ============================================================

#[test]
fn test_temporal_recursion_preserves_variance() {
    let n_faces = 500;
    let fields = InletFields::uniform(n_faces, 1.0, SymmTensor::isotropic(1.0), 0.5).unwrap();
    let mut temporal = TemporalCorrelator::new(&fields);
    let mut rng = RandomSource::new(99, 0);
    let dt = 0.05;
    let (a, b) = temporal.coefficients(0, 0, dt);
    assert!((a * a + b * b - 1.0).abs() < 1e-12);

    let steps = 400;
    let mut sum_sq = DVec3::ZERO;
    let mut samples = 0usize;
    for step in 0..steps {
        let fresh: Vec<DVec3> = (0..n_faces).map(|_| rng.normal_vec3()).collect();
        let u = temporal.blend(&fresh, dt).unwrap();
        if step >= 50 {
            for v in &u {
                sum_sq += *v * *v;
            }
            samples += u.len();
        }
    }
    let var = sum_sq / samples as f64;
    for c in 0..3 {
        assert!((var[c] - 1.0).abs() < 0.05, "component {c}: {}", var[c]);
    }
}
