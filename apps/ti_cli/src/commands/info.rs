// apps/ti_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示版本、默认配置以及重启快照的头信息。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use ti_config::InletConfig;
use ti_inflow::{GeneratorState, InletSnapshot};
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 显示系统信息
    #[arg(long)]
    pub system: bool,

    /// 以 JSON 显示默认配置
    #[arg(long)]
    pub defaults: bool,

    /// 显示重启快照内容
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== TurbInflow 信息 ===");

    if args.system {
        print_system_info();
    }

    if args.defaults {
        print_default_config()?;
    }

    if let Some(path) = &args.snapshot {
        print_snapshot(path)?;
    }

    if args.snapshot.is_none() && !args.system && !args.defaults {
        // 默认显示所有信息
        print_system_info();
        println!();
        print_default_config()?;
    }

    Ok(())
}

fn print_system_info() {
    println!("=== 系统信息 ===");
    println!("TurbInflow CLI 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("目标平台: {}", std::env::consts::ARCH);
    println!("操作系统: {}", std::env::consts::OS);
    println!("并行线程: {}", available_threads());

    println!("\n生成方法:");
    println!("  - dfm   (数字滤波法)");
    println!("  - dfsem (离散合成涡法)");
    println!("  - mean  (仅平均速度)");
}

fn available_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn print_default_config() -> Result<()> {
    println!("=== 默认配置 ===");
    let json = serde_json::to_string_pretty(&InletConfig::default())
        .context("无法序列化默认配置")?;
    println!("{json}");
    Ok(())
}

fn print_snapshot(path: &Path) -> Result<()> {
    let snapshot = InletSnapshot::load_from_file(path)
        .with_context(|| format!("无法读取快照: {}", path.display()))?;

    println!("=== 快照: {} ===", path.display());
    println!("格式版本: {}", snapshot.version);
    println!("边界: {}", snapshot.patch);
    println!("进程: {} / {}", snapshot.rank, snapshot.n_ranks);
    println!("面数: {}", snapshot.n_faces);
    println!("方法: {}", snapshot.method());
    println!("时间步: {}", snapshot.time_index);
    match snapshot.last_time {
        Some(t) => println!("最近时间: {t} s"),
        None => println!("最近时间: (未推进)"),
    }
    match &snapshot.state {
        GeneratorState::Dfsem(state) => println!("本地涡数: {}", state.eddies.len()),
        GeneratorState::Dfm(state) => {
            let temporal = state.temporal.as_ref().map_or(0, Vec::len);
            println!("时间相关场: {temporal} 面");
            println!("冻结网格: {}", if state.frozen_grid.is_some() { "是" } else { "否" });
        }
        GeneratorState::Mean => {}
    }
    Ok(())
}
