// crates/ti_config/src/inlet_config.rs

//! InletConfig - 湍流入口配置（全 f64）
//!
//! 对应边界字典中的 `mapMethod`、`perturb`、`density`、`delta`、`gridFactor`
//! 等参数，按生成方法分为 DFM 与 DFSEM 两个子配置。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::profile::InflowProperties;

/// 湍流入口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InletConfig {
    /// 边界名称（仅用于日志与诊断文件头）
    #[serde(default = "default_patch")]
    pub patch: String,

    /// 生成方法
    #[serde(default)]
    pub method: InletMethod,

    /// 边界数据映射方式（由外部插值层使用，此处只校验与记录）
    #[serde(default)]
    pub map_method: MapMethod,

    /// 查询点扰动（包围盒对角线长度的比例）
    #[serde(default = "default_perturb")]
    pub perturb: f64,

    /// 随机数基础种子
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// y 方向周期
    #[serde(default)]
    pub periodic_in_y: bool,

    /// z 方向周期
    #[serde(default)]
    pub periodic_in_z: bool,

    /// 横向参考轴（`Naxis`），缺省取全局 z 轴
    #[serde(default)]
    pub lateral_axis: Option<[f64; 3]>,

    /// 横向参考轴与法向平行时使用的旋转角 [度]（`beta`）
    #[serde(default)]
    pub beta: f64,

    /// 重启方式
    #[serde(default)]
    pub restart: RestartMode,

    /// DFM 参数
    #[serde(default)]
    pub dfm: DfmConfig,

    /// DFSEM 参数
    #[serde(default)]
    pub dfsem: DfsemConfig,

    /// 诊断输出
    #[serde(default)]
    pub output: OutputConfig,

    /// 剖面计算的入流属性（`inflowProperties`），缺省由宿主提供场
    #[serde(default)]
    pub inflow: Option<InflowProperties>,
}

fn default_patch() -> String {
    "inlet".to_string()
}
fn default_perturb() -> f64 {
    1e-5
}
fn default_seed() -> u64 {
    1234
}

impl Default for InletConfig {
    fn default() -> Self {
        Self {
            patch: default_patch(),
            method: InletMethod::default(),
            map_method: MapMethod::default(),
            perturb: default_perturb(),
            seed: default_seed(),
            periodic_in_y: false,
            periodic_in_z: false,
            lateral_axis: None,
            beta: 0.0,
            restart: RestartMode::default(),
            dfm: DfmConfig::default(),
            dfsem: DfsemConfig::default(),
            output: OutputConfig::default(),
            inflow: None,
        }
    }
}

impl InletConfig {
    /// 从 JSON 文件加载并校验
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串加载并校验
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 写出为 JSON 文件
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 校验所有参数，返回第一个违规项
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.perturb) {
            return Err(ConfigError::invalid("perturb", self.perturb, "必须位于 [0, 1)"));
        }
        if let Some(axis) = self.lateral_axis {
            let mag2: f64 = axis.iter().map(|v| v * v).sum();
            if !(mag2 > 0.0) || !mag2.is_finite() {
                return Err(ConfigError::invalid(
                    "lateral_axis",
                    format!("{:?}", axis),
                    "必须为非零有限向量",
                ));
            }
        }
        if !self.beta.is_finite() {
            return Err(ConfigError::invalid("beta", self.beta, "必须有限"));
        }
        self.dfm.validate()?;
        self.dfsem.validate()?;
        if let Some(inflow) = &self.inflow {
            inflow.validate()?;
        }
        Ok(())
    }
}

// ============================================================
// 枚举
// ============================================================

/// 湍流生成方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InletMethod {
    /// 数字滤波法
    #[default]
    Dfm,
    /// 离散合成涡方法
    Dfsem,
    /// 仅平均速度（无脉动）
    Mean,
}

impl fmt::Display for InletMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dfm => write!(f, "dfm"),
            Self::Dfsem => write!(f, "dfsem"),
            Self::Mean => write!(f, "mean"),
        }
    }
}

impl FromStr for InletMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dfm" => Ok(Self::Dfm),
            "dfsem" => Ok(Self::Dfsem),
            "mean" => Ok(Self::Mean),
            other => Err(ConfigError::invalid("method", other, "支持 dfm | dfsem | mean")),
        }
    }
}

/// 边界数据映射方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MapMethod {
    /// 最近单元
    #[default]
    #[serde(rename = "nearestCell")]
    NearestCell,
    /// 平面三角插值
    #[serde(rename = "planarInterpolation")]
    PlanarInterpolation,
}

impl FromStr for MapMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearestCell" => Ok(Self::NearestCell),
            "planarInterpolation" => Ok(Self::PlanarInterpolation),
            other => Err(ConfigError::invalid(
                "map_method",
                other,
                "支持 nearestCell | planarInterpolation",
            )),
        }
    }
}

/// DFM 滤波器形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterShape {
    /// 高斯滤波器（Klein 等）
    #[default]
    Gaussian,
    /// 指数相关滤波器（Xie & Castro）
    Exponential,
}

impl FilterShape {
    /// 缺省截断宽度（以积分尺度 n 为单位）
    pub fn default_width_ratio(self) -> f64 {
        match self {
            Self::Gaussian => 2.0,
            Self::Exponential => 4.0,
        }
    }
}

/// DFSEM 涡尺度模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EddyScaleMode {
    /// 三个方向相同
    #[default]
    Isotropic,
    /// 按雷诺应力特征值缩放
    Anisotropic,
}

/// 重启方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RestartMode {
    /// 若存在快照则逐位恢复
    #[default]
    Resume,
    /// 忽略快照，由种子重新生成
    Clean,
}

// ============================================================
// 子配置
// ============================================================

/// DFM 参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DfmConfig {
    /// 虚拟网格间距与网格尺寸之比（`gridFactor`）
    #[serde(default = "default_grid_factor")]
    pub grid_factor: f64,

    /// 滤波器形状
    #[serde(default)]
    pub filter: FilterShape,

    /// 滤波器半宽与积分尺度之比（缺省随形状）
    #[serde(default)]
    pub filter_width: Option<f64>,

    /// 冻结随机场（只在初始化时抽样一次）
    #[serde(default)]
    pub frozen_random_field: bool,
}

fn default_grid_factor() -> f64 {
    1.0
}

impl Default for DfmConfig {
    fn default() -> Self {
        Self {
            grid_factor: default_grid_factor(),
            filter: FilterShape::default(),
            filter_width: None,
            frozen_random_field: false,
        }
    }
}

impl DfmConfig {
    /// 有效的截断宽度比
    pub fn width_ratio(&self) -> f64 {
        self.filter_width
            .unwrap_or_else(|| self.filter.default_width_ratio())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.grid_factor > 0.0) || !self.grid_factor.is_finite() {
            return Err(ConfigError::invalid(
                "dfm.grid_factor",
                self.grid_factor,
                "必须为正",
            ));
        }
        if let Some(w) = self.filter_width {
            if !(w >= 1.0) || !w.is_finite() {
                return Err(ConfigError::invalid("dfm.filter_width", w, "必须 >= 1"));
            }
        }
        Ok(())
    }
}

/// DFSEM 参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DfsemConfig {
    /// 特征长度（如半通道高）[m]
    #[serde(default = "default_delta")]
    pub delta: f64,

    /// 涡体积和与涡盒体积之比
    #[serde(default = "default_density")]
    pub density: f64,

    /// von Kármán 常数
    #[serde(default = "default_kappa")]
    pub kappa: f64,

    /// 解析一个涡所需的最少网格数
    #[serde(default = "default_n_cell_per_eddy")]
    pub n_cell_per_eddy: usize,

    /// 直接指定全局涡数（优先于 density）
    #[serde(default)]
    pub n_eddy: Option<usize>,

    /// 涡尺度模式
    #[serde(default)]
    pub scale_mode: EddyScaleMode,

    /// 涡播种最大尝试次数
    #[serde(default = "default_max_seed_attempts")]
    pub max_seed_attempts: usize,
}

fn default_delta() -> f64 {
    1.0
}
fn default_density() -> f64 {
    1.0
}
fn default_kappa() -> f64 {
    0.41
}
fn default_n_cell_per_eddy() -> usize {
    5
}
fn default_max_seed_attempts() -> usize {
    1000
}

impl Default for DfsemConfig {
    fn default() -> Self {
        Self {
            delta: default_delta(),
            density: default_density(),
            kappa: default_kappa(),
            n_cell_per_eddy: default_n_cell_per_eddy(),
            n_eddy: None,
            scale_mode: EddyScaleMode::default(),
            max_seed_attempts: default_max_seed_attempts(),
        }
    }
}

impl DfsemConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (key, v) in [
            ("dfsem.delta", self.delta),
            ("dfsem.density", self.density),
            ("dfsem.kappa", self.kappa),
        ] {
            if !(v > 0.0) || !v.is_finite() {
                return Err(ConfigError::invalid(key, v, "必须为正"));
            }
        }
        if self.n_cell_per_eddy == 0 {
            return Err(ConfigError::invalid("dfsem.n_cell_per_eddy", 0, "必须 >= 1"));
        }
        if self.n_eddy == Some(0) {
            return Err(ConfigError::invalid("dfsem.n_eddy", 0, "必须 >= 1"));
        }
        if self.max_seed_attempts == 0 {
            return Err(ConfigError::invalid("dfsem.max_seed_attempts", 0, "必须 >= 1"));
        }
        Ok(())
    }
}

/// 诊断输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 需要记录时间序列的面（本进程局部编号）
    #[serde(default)]
    pub probe_faces: Vec<usize>,

    /// 输出目录
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("postProcessing")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            probe_faces: Vec::new(),
            directory: default_output_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let cfg = InletConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.method, InletMethod::Dfm);
        assert_eq!(cfg.dfm.width_ratio(), 2.0);
    }

    #[test]
    fn test_parse_minimal_json() {
        let cfg = InletConfig::from_json_str(
            r#"{ "method": "dfsem", "map_method": "planarInterpolation", "dfsem": { "density": 2.0 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.method, InletMethod::Dfsem);
        assert_eq!(cfg.map_method, MapMethod::PlanarInterpolation);
        assert_eq!(cfg.dfsem.density, 2.0);
        assert_eq!(cfg.dfsem.kappa, 0.41);
    }

    #[test]
    fn test_unsupported_map_method_rejected() {
        let err = InletConfig::from_json_str(r#"{ "map_method": "bilinear" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!("bilinear".parse::<MapMethod>().is_err());
    }

    #[test]
    fn test_negative_density_names_field() {
        let mut cfg = InletConfig::default();
        cfg.dfsem.density = -1.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("dfsem.density"));
    }

    #[test]
    fn test_filter_width_bounds() {
        let mut cfg = InletConfig::default();
        cfg.dfm.filter = FilterShape::Exponential;
        assert_eq!(cfg.dfm.width_ratio(), 4.0);
        cfg.dfm.filter_width = Some(0.5);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inlet.json");
        let mut cfg = InletConfig::default();
        cfg.seed = 99;
        cfg.periodic_in_y = true;
        cfg.to_json_file(&path).unwrap();
        let back = InletConfig::from_json_file(&path).unwrap();
        assert_eq!(back.seed, 99);
        assert!(back.periodic_in_y);
    }
}
