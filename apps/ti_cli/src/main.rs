// apps/ti_cli/src/main.rs

//! TurbInflow 命令行界面
//!
//! 在矩形入口上运行合成湍流生成器，用于检查配置、输出探针时间序列
//! 以及生成/续算重启快照。

mod commands;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "ti_cli", version, long_about = None)]
#[command(about = "Synthetic turbulent inflow generator (DFM / DFSEM)")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// 对所有子命令生效的选项
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// rayon 工作线程数（缺省为可用核数）
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// 覆盖配置中的随机种子
    #[arg(long, global = true)]
    pub seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行生成器
    Run(commands::run::RunArgs),
    /// 显示信息
    Info(commands::info::InfoArgs),
    /// 验证配置
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 库中的 log 记录经 tracing-log 桥接到同一个订阅者
    tracing_subscriber::fmt()
        .with_max_level(cli.global.log_level)
        .with_target(false)
        .finish()
        .try_init()?;

    if let Some(threads) = cli.global.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("无法配置 rayon 线程池")?;
        tracing::debug!("rayon 线程数: {}", rayon::current_num_threads());
    }

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.global),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
