// apps/ti_cli/src/commands/run.rs

//! 运行生成器命令
//!
//! 在 `ny × nz` 矩形入口上推进合成湍流生成器，统计速度样本并可写出
//! 重启快照。`--ranks` 大于 1 时用线程模拟多进程分区。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use glam::DVec3;
use ti_config::{InletConfig, InletMethod};
use ti_foundation::{SymmTensor, TiError};
use ti_inflow::parallel::{Communicator, LocalWorld, SerialComm};
use ti_inflow::{InletFields, InletSnapshot, PatchFaces, TurbulentInlet};
use tracing::{info, warn};

use crate::GlobalArgs;

/// 运行参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径（缺省使用默认配置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 覆盖配置中的生成方法 (dfm, dfsem, mean)
    #[arg(short, long)]
    pub method: Option<InletMethod>,

    /// 横向 (y) 面数
    #[arg(long, default_value = "32")]
    pub ny: usize,

    /// 竖向 (z) 面数
    #[arg(long, default_value = "32")]
    pub nz: usize,

    /// 入口宽度 [m]
    #[arg(long, default_value = "1.0")]
    pub width: f64,

    /// 入口高度 [m]
    #[arg(long, default_value = "1.0")]
    pub height: f64,

    /// 结束时间 [s]
    #[arg(short = 't', long, default_value = "1.0")]
    pub end_time: f64,

    /// 时间步长 [s]
    #[arg(long, default_value = "0.01")]
    pub dt: f64,

    /// 模拟进程数
    #[arg(long, default_value = "1")]
    pub ranks: usize,

    /// 配置无 `inflow` 时的均匀平均速度 [m/s]
    #[arg(long, default_value = "10.0")]
    pub u_mean: f64,

    /// 配置无 `inflow` 时的各向同性脉动均方根 [m/s]
    #[arg(long, default_value = "1.0")]
    pub u_rms: f64,

    /// 配置无 `inflow` 时的积分长度尺度 [m]
    #[arg(long, default_value = "0.1")]
    pub length: f64,

    /// 从该目录读取重启快照
    #[arg(long)]
    pub restart: Option<PathBuf>,

    /// 结束后把快照写入该目录
    #[arg(long)]
    pub save_snapshot: Option<PathBuf>,

    /// 进度日志间隔（步）
    #[arg(long, default_value = "100")]
    pub log_interval: u64,
}

/// 单个进程的速度样本累计
#[derive(Debug, Clone, Copy, Default)]
struct VelocityStats {
    samples: usize,
    sum: DVec3,
    sum_sq: DVec3,
    steps: u64,
}

impl VelocityStats {
    fn add(&mut self, u: &[DVec3]) {
        for v in u {
            self.sum += *v;
            self.sum_sq += *v * *v;
        }
        self.samples += u.len();
    }

    fn merge(mut self, other: &Self) -> Self {
        self.samples += other.samples;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.steps = self.steps.max(other.steps);
        self
    }

    fn mean(&self) -> DVec3 {
        if self.samples == 0 {
            return DVec3::ZERO;
        }
        self.sum / self.samples as f64
    }

    fn std(&self) -> DVec3 {
        if self.samples < 2 {
            return DVec3::ZERO;
        }
        let n = self.samples as f64;
        let mean = self.mean();
        let var = (self.sum_sq - mean * mean * n) / (n - 1.0);
        let var = var.max(DVec3::ZERO);
        DVec3::new(var.x.sqrt(), var.y.sqrt(), var.z.sqrt())
    }
}

/// 执行运行命令
pub fn execute(args: RunArgs, global: &GlobalArgs) -> Result<()> {
    info!("=== TurbInflow 合成湍流入口 ===");

    if args.ny == 0 || args.nz == 0 {
        bail!("入口面数必须为正: ny = {}, nz = {}", args.ny, args.nz);
    }
    if args.dt.is_nan() || args.dt <= 0.0 || args.end_time.is_nan() || args.end_time <= 0.0 {
        bail!("时间步长与结束时间必须为正: dt = {}, end_time = {}", args.dt, args.end_time);
    }
    if args.ranks == 0 || args.ranks > args.ny * args.nz {
        bail!("进程数 {} 超出范围 [1, {}]", args.ranks, args.ny * args.nz);
    }

    let mut config = match &args.config {
        Some(path) => InletConfig::from_json_file(path)
            .with_context(|| format!("无法加载配置: {}", path.display()))?,
        None => {
            info!("未指定配置文件，使用默认配置");
            InletConfig::default()
        }
    };
    if let Some(method) = args.method {
        config.method = method;
    }
    if let Some(seed) = global.seed {
        config.seed = seed;
    }
    config.validate().context("配置验证失败")?;

    info!("边界: {}", config.patch);
    info!("方法: {}，种子 {}", config.method, config.seed);
    info!("网格: {} × {} 面，{} × {} m", args.ny, args.nz, args.width, args.height);
    info!("时间: dt = {} s, 结束 = {} s", args.dt, args.end_time);
    info!("进程数: {}", args.ranks);
    if config.inflow.is_none() {
        info!(
            "入流: 均匀 U = {} m/s, u' = {} m/s, L = {} m",
            args.u_mean, args.u_rms, args.length
        );
    }

    let faces = PatchFaces::rectangle(args.ny, args.nz, args.width, args.height);
    let start = Instant::now();

    let stats = if args.ranks == 1 {
        run_rank(&args, &config, &faces, Arc::new(SerialComm))?
    } else {
        let results = LocalWorld::run(args.ranks, |comm| {
            let local = faces.split(comm.rank(), comm.size());
            run_rank(&args, &config, &local, Arc::new(comm))
        });
        merge_ranks(results)?
    };

    let elapsed = start.elapsed();
    let mean = stats.mean();
    let std = stats.std();

    println!("\n=== 运行完成 ===");
    println!("推进步数: {}", stats.steps);
    println!("速度样本: {}", stats.samples);
    println!("平均速度: ({:.4}, {:.4}, {:.4}) m/s", mean.x, mean.y, mean.z);
    println!("标准差:   ({:.4}, {:.4}, {:.4}) m/s", std.x, std.y, std.z);
    println!("耗时: {:.2?}", elapsed);

    Ok(())
}

/// 合并各进程结果
///
/// 一个进程失败时其余进程报告并行一致性错误，返回时优先给出根因。
fn merge_ranks(results: Vec<Result<VelocityStats>>) -> Result<VelocityStats> {
    let mut total = VelocityStats::default();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(stats) => total = total.merge(&stats),
            Err(e) => errors.push(e),
        }
    }
    let is_follow_up = |e: &anyhow::Error| {
        matches!(e.downcast_ref::<TiError>(), Some(TiError::ParallelConsistency { .. }))
    };
    match errors.iter().position(|e| !is_follow_up(e)) {
        Some(i) => Err(errors.swap_remove(i)),
        None => match errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(total),
        },
    }
}

/// 快照文件路径：每个进程一个文件
fn snapshot_path(directory: &Path, patch: &str, rank: usize) -> PathBuf {
    directory.join(format!("{patch}.rank{rank}.tirs"))
}

/// 单个进程上的推进循环
fn run_rank(
    args: &RunArgs,
    config: &InletConfig,
    faces: &PatchFaces,
    comm: Arc<dyn Communicator>,
) -> Result<VelocityStats> {
    let rank = comm.rank();
    let fields = match config.inflow {
        Some(_) => None,
        None => Some(InletFields::uniform(
            faces.len(),
            args.u_mean,
            SymmTensor::isotropic(args.u_rms),
            args.length,
        )?),
    };
    let mut inlet = TurbulentInlet::new(config.clone(), faces, fields, comm)?;

    if let Some(dir) = &args.restart {
        let path = snapshot_path(dir, &config.patch, rank);
        let snapshot = if path.exists() {
            let s = InletSnapshot::load_from_file(&path)
                .with_context(|| format!("无法读取快照: {}", path.display()))?;
            info!("rank {rank}: 从 {} 续算 (步 {})", path.display(), s.time_index);
            Some(s)
        } else {
            warn!("rank {rank}: 快照 {} 不存在，按种子重新初始化", path.display());
            None
        };
        inlet.restore_state(snapshot)?;
    }

    let first = inlet.time_index();
    let last = (args.end_time / args.dt).round() as u64;
    if last <= first {
        warn!("rank {rank}: 快照时间步 {first} 已达到结束步 {last}，不再推进");
    }

    let mut stats = VelocityStats::default();
    for step in first..last {
        let time = (step + 1) as f64 * args.dt;
        let u = inlet.update(time, args.dt)?;
        stats.add(u);
        if rank == 0 && args.log_interval > 0 && (step + 1) % args.log_interval == 0 {
            info!("步 {} / {}, t = {:.4} s", step + 1, last, time);
        }
    }
    stats.steps = inlet.time_index();

    if let Some(dir) = &args.save_snapshot {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("无法创建快照目录: {}", dir.display()))?;
        let path = snapshot_path(dir, &config.patch, rank);
        inlet.serialize_state()?.save_to_file(&path)?;
        info!("rank {rank}: 快照已写入 {}", path.display());
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_mean_and_std() {
        let mut s = VelocityStats::default();
        s.add(&[DVec3::new(1.0, 0.0, -1.0), DVec3::new(3.0, 0.0, 1.0)]);
        assert_eq!(s.mean(), DVec3::new(2.0, 0.0, 0.0));
        let std = s.std();
        assert!((std.x - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(std.y, 0.0);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = VelocityStats::default();
        a.add(&[DVec3::ONE]);
        a.steps = 3;
        let mut b = VelocityStats::default();
        b.add(&[DVec3::ONE * 3.0]);
        b.steps = 3;
        let m = a.merge(&b);
        assert_eq!(m.samples, 2);
        assert_eq!(m.mean(), DVec3::splat(2.0));
        assert_eq!(m.steps, 3);
    }

    #[test]
    fn test_snapshot_path_per_rank() {
        let p = snapshot_path(Path::new("snap"), "inlet", 2);
        assert_eq!(p, Path::new("snap").join("inlet.rank2.tirs"));
    }

    #[test]
    fn test_merge_prefers_root_cause() {
        let ok = VelocityStats::default();
        let results = vec![
            Ok(ok),
            Err(anyhow::Error::new(TiError::parallel("rank 0 等待时其他 rank 已退出"))),
            Err(anyhow::Error::new(TiError::numerical("face 3", "R 非半正定"))),
        ];
        let err = merge_ranks(results).unwrap_err();
        assert!(matches!(err.downcast_ref::<TiError>(), Some(TiError::Numerical { .. })));

        let only_parallel = vec![Err(anyhow::Error::new(TiError::parallel("x")))];
        assert!(merge_ranks(only_parallel).is_err());
        assert_eq!(merge_ranks(vec![Ok(ok), Ok(ok)]).unwrap().samples, 0);
    }
}
