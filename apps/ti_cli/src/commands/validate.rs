// apps/ti_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 解析并校验入口配置文件，给出错误与可能影响统计质量的警告。

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use ti_config::{InletConfig, InletMethod, MapMethod, ProfileKind, RestartMode};
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== TurbInflow 配置验证 ===");

    let mut result = ValidationResult::default();
    if let Some(config) = load_config(&args.config, &mut result) {
        check_config(&config, &mut result);
    }

    print_validation_result(&result, args.strict)
}

fn load_config(path: &Path, result: &mut ValidationResult) -> Option<InletConfig> {
    println!("\n检查配置文件: {}", path.display());

    if !path.exists() {
        result.add_error(format!("配置文件不存在: {}", path.display()));
        return None;
    }

    match InletConfig::from_json_file(path) {
        Ok(config) => {
            println!("  ✓ 配置文件格式有效");
            Some(config)
        }
        Err(e) => {
            result.add_error(e.to_string());
            None
        }
    }
}

/// 硬性校验之外的经验性检查
fn check_config(config: &InletConfig, result: &mut ValidationResult) {
    if let Err(e) = config.validate() {
        result.add_error(e.to_string());
        return;
    }
    println!("  ✓ 参数取值有效 (方法 {})", config.method);

    match &config.inflow {
        None => result.add_warning("未配置 inflow 剖面，入流场需由调用方提供"),
        Some(inflow) => {
            if inflow.r.profile == ProfileKind::Uniform
                && config.method != InletMethod::Mean
                && inflow.r.reference_value.max_abs() == 0.0
            {
                result.add_error("inflow.R 为零张量，无法生成脉动");
            }
        }
    }

    if config.perturb == 0.0 {
        result.add_warning("perturb = 0，规则网格上的面坐标可能与虚拟网格节点重合");
    }

    if config.method == InletMethod::Dfsem && config.dfsem.density < 1.0 {
        result.add_warning(format!(
            "dfsem.density = {} 较小，单点统计将明显偏离高斯分布",
            config.dfsem.density
        ));
    }

    if config.method == InletMethod::Dfm && config.dfm.frozen_random_field {
        result.add_warning("dfm.frozen_random_field 开启：随机场只抽样一次");
    }

    if config.map_method != MapMethod::default() {
        result.add_warning(format!("map_method = {:?} 仅被记录，不影响生成", config.map_method));
    }

    if config.restart == RestartMode::Clean {
        result.add_warning("restart = clean：续算时将丢弃快照并按种子重新初始化");
    }

    if !config.output.probe_faces.is_empty() && config.output.directory.as_os_str().is_empty() {
        result.add_error("output.directory 为空，但配置了探针面");
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!();

    for e in &result.errors {
        error!("{}", e);
        println!("  ✗ 错误: {}", e);
    }
    for w in &result.warnings {
        warn!("{}", w);
        println!("  ! 警告: {}", w);
    }

    let passed = if strict {
        result.is_ok_strict()
    } else {
        result.is_ok()
    };

    println!(
        "\n结果: {} 个错误, {} 个警告",
        result.errors.len(),
        result.warnings.len()
    );

    if passed {
        println!("✓ 验证通过");
        Ok(())
    } else {
        bail!("验证失败")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_only_warns() {
        let mut result = ValidationResult::default();
        check_config(&InletConfig::default(), &mut result);
        assert!(result.is_ok());
        assert!(!result.is_ok_strict());
    }

    #[test]
    fn test_invalid_value_is_error() {
        let config = InletConfig {
            perturb: 2.0,
            ..InletConfig::default()
        };
        let mut result = ValidationResult::default();
        check_config(&config, &mut result);
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("perturb"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let mut result = ValidationResult::default();
        assert!(load_config(Path::new("no/such/inlet.json"), &mut result).is_none());
        assert!(!result.is_ok());
    }
}
