// crates/ti_inflow/tests/inlet_tests.rs
//!
//! 配置驱动的入口测试
//!
//! JSON 配置 → 剖面计算入流场 → 推进 → 探针文件

use std::sync::Arc;

use glam::DVec3;
use serde_json::json;
use ti_config::InletConfig;
use ti_foundation::{SymmTensor, TiError};
use ti_inflow::parallel::SerialComm;
use ti_inflow::{InletFields, PatchFaces, TurbulentInlet};

fn config_from(value: serde_json::Value) -> InletConfig {
    serde_json::from_value(value).unwrap()
}

fn diag_stress() -> serde_json::Value {
    json!({ "xx": 0.4, "xy": 0.0, "xz": 0.0, "yy": 0.2, "yz": 0.0, "zz": 0.1 })
}

// ============================================================
// 剖面
// ============================================================

#[test]
fn test_linear_velocity_profile_drives_mean_inlet() {
    let config = config_from(json!({
        "method": "mean",
        "perturb": 0.0,
        "inflow": {
            "U": { "profile": "linear", "reference_value": 10.0, "reference_dist": 1.0, "alpha": 0.5 },
            "R": { "reference_value": diag_stress() },
            "L": { "reference_value": 0.1 }
        }
    }));
    let faces = PatchFaces::rectangle(2, 4, 1.0, 1.0);
    let mut inlet = TurbulentInlet::new(config, &faces, None, Arc::new(SerialComm)).unwrap();

    let u = inlet.update(0.1, 0.1).unwrap().to_vec();
    for (face, (v, c)) in u.iter().zip(&faces.centres).enumerate() {
        // 参考方向 θ = 0 即局部 z，原点为包围盒下角
        let expected = 10.0 * (0.5 * (c.z - 1.0) + 1.0);
        assert!((v.x - expected).abs() < 1e-12, "face {face}: {} vs {expected}", v.x);
        assert_eq!(v.y, 0.0);
        assert_eq!(v.z, 0.0);
    }
}

#[test]
fn test_exponential_stress_profile_scales_eigenvalues() {
    let config = config_from(json!({
        "method": "dfm",
        "perturb": 0.0,
        "inflow": {
            "U": { "reference_value": 5.0 },
            "R": { "profile": "exponential", "reference_value": diag_stress(), "alpha": [2.0, 2.0, 1.0] },
            "L": { "reference_value": 0.2 }
        }
    }));
    let faces = PatchFaces::rectangle(3, 5, 1.0, 1.0);
    let inlet = TurbulentInlet::new(config, &faces, None, Arc::new(SerialComm)).unwrap();

    let r = &inlet.fields().r;
    let k = inlet.turbulent_kinetic_energy();
    for (face, c) in faces.centres.iter().enumerate() {
        let d = c.z;
        let expected = SymmTensor::diagonal(0.4 * d * d, 0.2 * d * d, 0.1 * d);
        for (a, b) in [(0, 0), (1, 1), (2, 2), (0, 1), (1, 2)] {
            assert!(
                (r[face].component(a, b) - expected.component(a, b)).abs() < 1e-12,
                "face {face} component ({a}, {b})"
            );
        }
        let k_expected = 0.5 * (expected.xx + expected.yy + expected.zz);
        assert!((k[face] - k_expected).abs() < 1e-12);
    }
}

#[test]
fn test_nonpositive_reference_distance_rejected() {
    let config = config_from(json!({
        "inflow": {
            "U": { "profile": "linear", "reference_value": 10.0, "reference_dist": 0.0 },
            "R": { "reference_value": diag_stress() },
            "L": { "reference_value": 0.1 }
        }
    }));
    let faces = PatchFaces::rectangle(2, 2, 1.0, 1.0);
    let err = TurbulentInlet::new(config, &faces, None, Arc::new(SerialComm)).unwrap_err();
    assert!(matches!(err, TiError::Configuration { .. }), "{err}");
}

#[test]
fn test_missing_inflow_names_key() {
    let config = config_from(json!({ "method": "dfsem" }));
    let faces = PatchFaces::rectangle(2, 2, 1.0, 1.0);
    let err = TurbulentInlet::new(config, &faces, None, Arc::new(SerialComm)).unwrap_err();
    match err {
        TiError::Configuration { field, .. } => assert_eq!(field, "inflow"),
        other => panic!("unexpected: {other:?}"),
    }
}

// ============================================================
// 探针输出
// ============================================================

#[test]
fn test_probe_files_follow_updates() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_from(json!({
        "patch": "inlet",
        "method": "dfm",
        "seed": 9,
        "output": { "probe_faces": [0, 5], "directory": dir.path() }
    }));
    let faces = PatchFaces::rectangle(4, 4, 1.0, 1.0);
    let fields = InletFields::uniform(16, 3.0, SymmTensor::isotropic(0.3), 0.2).unwrap();
    let mut inlet = TurbulentInlet::new(config, &faces, Some(fields), Arc::new(SerialComm)).unwrap();

    let mut history = Vec::new();
    for step in 1..=3 {
        let t = step as f64 * 0.1;
        history.push(inlet.update(t, 0.1).unwrap().to_vec());
        // 同一时间重复调用不追加行
        inlet.update(t, 0.1).unwrap();
    }
    drop(inlet);

    for face in [0usize, 5] {
        let text = std::fs::read_to_string(dir.path().join(format!("inlet_face{face}.dat"))).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.contains(&"# patch\tinlet"));
        assert!(lines.contains(&"# method\tdfm"));
        assert!(lines.contains(&format!("# face\t{face}").as_str()));

        let header = lines.iter().position(|l| *l == "# Time\tUx\tUy\tUz").unwrap();
        let rows: Vec<Vec<f64>> = lines[header + 1..]
            .iter()
            .map(|l| l.split('\t').map(|v| v.parse().unwrap()).collect())
            .collect();
        assert_eq!(rows.len(), 3);
        for (step, row) in rows.iter().enumerate() {
            let u = history[step][face];
            assert!((row[0] - (step + 1) as f64 * 0.1).abs() < 1e-12);
            assert_eq!(DVec3::new(row[1], row[2], row[3]), u);
        }
    }
}

#[test]
fn test_probe_face_out_of_range_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_from(json!({
        "output": { "probe_faces": [4], "directory": dir.path() }
    }));
    let faces = PatchFaces::rectangle(2, 2, 1.0, 1.0);
    let fields = InletFields::uniform(4, 1.0, SymmTensor::isotropic(0.1), 0.1).unwrap();
    let err = TurbulentInlet::new(config, &faces, Some(fields), Arc::new(SerialComm)).unwrap_err();
    assert!(matches!(err, TiError::Configuration { .. }), "{err}");
}

// ============================================================
// 运行中更新雷诺应力
// ============================================================

#[test]
fn test_scaled_stress_scales_fluctuation() {
    let faces = PatchFaces::rectangle(6, 6, 1.0, 1.0);
    let r = SymmTensor::new(0.5, 0.1, 0.0, 0.3, 0.05, 0.2);
    let build = || {
        let config = config_from(json!({ "method": "dfm", "seed": 4, "periodic_in_y": true }));
        let fields = InletFields::uniform(36, 2.0, r, 0.15).unwrap();
        TurbulentInlet::new(config, &faces, Some(fields), Arc::new(SerialComm)).unwrap()
    };

    let mut a = build();
    let mut b = build();
    b.set_reynolds_stress(vec![r * 4.0; 36]).unwrap();

    for step in 1..=3 {
        let t = step as f64 * 0.05;
        let ua = a.compute_fluctuation(t, 0.05).unwrap().to_vec();
        let ub = b.compute_fluctuation(t, 0.05).unwrap().to_vec();
        for (x, y) in ua.iter().zip(&ub) {
            assert!((*y - 2.0 * *x).length() < 1e-12);
        }
    }
}

#[test]
fn test_set_stress_rejects_wrong_size_and_indefinite() {
    let faces = PatchFaces::rectangle(3, 3, 1.0, 1.0);
    let config = config_from(json!({ "method": "dfm" }));
    let fields = InletFields::uniform(9, 2.0, SymmTensor::isotropic(0.5), 0.1).unwrap();
    let mut inlet = TurbulentInlet::new(config, &faces, Some(fields), Arc::new(SerialComm)).unwrap();

    let err = inlet.set_reynolds_stress(vec![SymmTensor::isotropic(0.5); 8]).unwrap_err();
    assert!(matches!(err, TiError::SizeMismatch { .. }), "{err}");

    let mut bad = vec![SymmTensor::isotropic(0.5); 9];
    bad[4] = SymmTensor::diagonal(1.0, -0.5, 1.0);
    let err = inlet.set_reynolds_stress(bad).unwrap_err();
    assert!(matches!(err, TiError::Numerical { .. }), "{err}");
    // 失败后保持原应力
    assert!(inlet.fields().r.iter().all(|t| *t == SymmTensor::isotropic(0.5)));
}
