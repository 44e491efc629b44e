// crates/ti_inflow/src/state.rs

//! 重启快照
//!
//! 每个进程保存一份自己的快照（bincode 二进制）：
//!
//! ```text
//! [魔数 "TIRS"][InletSnapshot (bincode)]
//! ```
//!
//! 写入先落到临时文件再重命名，中途失败不会破坏已有快照。

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use ti_config::InletMethod;
use ti_foundation::{TiError, TiResult};

use crate::dfm::DfmState;
use crate::dfsem::DfsemState;

// ============================================================
// 常量
// ============================================================

/// 快照格式版本
pub const SNAPSHOT_VERSION: u32 = 1;

/// 快照魔数
const SNAPSHOT_MAGIC: &[u8; 4] = b"TIRS";

// ============================================================
// 生成器状态
// ============================================================

/// 各生成方法的可恢复状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeneratorState {
    /// 数字滤波法
    Dfm(DfmState),
    /// 离散合成涡法
    Dfsem(DfsemState),
    /// 只有平均速度
    Mean,
}

impl GeneratorState {
    /// 对应的生成方法
    pub fn method(&self) -> InletMethod {
        match self {
            Self::Dfm(_) => InletMethod::Dfm,
            Self::Dfsem(_) => InletMethod::Dfsem,
            Self::Mean => InletMethod::Mean,
        }
    }
}

// ============================================================
// 快照
// ============================================================

/// 入口重启快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InletSnapshot {
    /// 格式版本
    pub version: u32,
    /// 边界名
    pub patch: String,
    /// 写出快照的进程号
    pub rank: usize,
    /// 进程总数
    pub n_ranks: usize,
    /// 本进程面数
    pub n_faces: usize,
    /// 最近一次推进的时间步编号
    pub time_index: u64,
    /// 最近一次推进的时间
    pub last_time: Option<f64>,
    /// 生成器状态
    pub state: GeneratorState,
}

impl InletSnapshot {
    /// 生成方法
    pub fn method(&self) -> InletMethod {
        self.state.method()
    }

    /// 一致性检查
    pub fn validate(&self) -> TiResult<()> {
        if self.version > SNAPSHOT_VERSION {
            return Err(TiError::serialization(format!(
                "快照版本 {} 高于当前支持的 {}",
                self.version, SNAPSHOT_VERSION
            )));
        }
        if self.rank >= self.n_ranks {
            return Err(TiError::serialization(format!(
                "进程号 {} 超出进程数 {}",
                self.rank, self.n_ranks
            )));
        }
        if let Some(t) = self.last_time {
            if !t.is_finite() {
                return Err(TiError::serialization(format!("时间 {t} 非有限值")));
            }
        }
        match &self.state {
            GeneratorState::Dfm(s) => {
                if let Some(temporal) = &s.temporal {
                    if temporal.len() != self.n_faces {
                        return Err(TiError::size_mismatch(
                            "snapshot temporal field",
                            self.n_faces,
                            temporal.len(),
                        ));
                    }
                    if temporal.iter().any(|v| !v.is_finite()) {
                        return Err(TiError::serialization("时间相关场含非有限值"));
                    }
                }
            }
            GeneratorState::Dfsem(s) => {
                if let Some(e) = s.eddies.iter().find(|e| e.owner != self.rank) {
                    return Err(TiError::serialization(format!(
                        "涡 {} 属于进程 {}，快照来自进程 {}",
                        e.label, e.owner, self.rank
                    )));
                }
                if s
                    .eddies
                    .iter()
                    .any(|e| !e.position.is_finite() || e.sigma.min_element() <= 0.0)
                {
                    return Err(TiError::serialization("涡位置或尺度非法"));
                }
            }
            GeneratorState::Mean => {}
        }
        Ok(())
    }

    /// 保存到文件
    pub fn save_to_file(&self, path: &Path) -> TiResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tirs.tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(SNAPSHOT_MAGIC)?;
            bincode::serialize_into(&mut writer, self)
                .map_err(|e| TiError::serialization(e.to_string()))?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, path)?;
        log::debug!("快照已写出: {}", path.display());
        Ok(())
    }

    /// 从文件加载并检查
    pub fn load_from_file(path: &Path) -> TiResult<Self> {
        let file = File::open(path)
            .map_err(|e| TiError::io_with_source(format!("无法打开 {}", path.display()), e))?;
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(TiError::serialization(format!(
                "{} 不是入口快照文件",
                path.display()
            )));
        }
        let snapshot: Self = bincode::deserialize_from(&mut reader)
            .map_err(|e| TiError::serialization(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dfsem::Eddy;
    use crate::random::RandomSource;
    use glam::DVec3;

    fn snapshot(state: GeneratorState) -> InletSnapshot {
        InletSnapshot {
            version: SNAPSHOT_VERSION,
            patch: "inlet".into(),
            rank: 0,
            n_ranks: 1,
            n_faces: 2,
            time_index: 7,
            last_time: Some(0.35),
            state,
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restart/inlet.tirs");
        let snap = snapshot(GeneratorState::Dfm(DfmState {
            rng: RandomSource::new(3, 0).state(),
            temporal: Some(vec![DVec3::X, DVec3::new(0.1, -0.2, 0.3)]),
            frozen_grid: None,
        }));
        snap.save_to_file(&path).unwrap();
        let loaded = InletSnapshot::load_from_file(&path).unwrap();
        assert_eq!(loaded, snap);
        assert_eq!(loaded.method(), InletMethod::Dfm);
        assert!(!path.with_extension("tirs.tmp").exists());
    }

    #[test]
    fn test_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        std::fs::write(&path, b"not a snapshot").unwrap();
        assert!(InletSnapshot::load_from_file(&path).is_err());
    }

    #[test]
    fn test_validate_checks_sizes_and_owners() {
        let short = snapshot(GeneratorState::Dfm(DfmState {
            rng: RandomSource::new(3, 0).state(),
            temporal: Some(vec![DVec3::X]),
            frozen_grid: None,
        }));
        assert!(short.validate().is_err());

        let foreign = snapshot(GeneratorState::Dfsem(DfsemState {
            rng: RandomSource::new(3, 0).state(),
            eddies: vec![Eddy {
                label: 0,
                position: DVec3::ZERO,
                sigma: DVec3::splat(0.1),
                sign: DVec3::ONE,
                owner: 1,
            }],
        }));
        assert!(foreign.validate().is_err());

        let mut future = snapshot(GeneratorState::Mean);
        assert!(future.validate().is_ok());
        future.version = SNAPSHOT_VERSION + 1;
        assert!(future.validate().is_err());
    }
}
