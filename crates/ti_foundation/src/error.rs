// crates/ti_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `TiError` 枚举和 `TiResult` 类型别名。
//!
//! # 错误分类
//!
//! 1. **配置错误** (`Configuration`): 参数缺失或非法，初始化时检出
//! 2. **数值错误** (`Numerical`): 雷诺应力非半正定、Bessel 参数越界
//! 3. **并行一致性错误** (`ParallelConsistency`): 全局涡数不一致、分区边界不一致、通信失败
//!
//! 以上三类均为致命错误。可恢复的数值瑕疵（系数下溢、分母接近零）
//! 不走错误通道，而是在调用处截断并记录警告。
//!
//! # 示例
//!
//! ```
//! use ti_foundation::error::{TiError, TiResult};
//!
//! fn read_density(value: f64) -> TiResult<f64> {
//!     if value <= 0.0 {
//!         return Err(TiError::config("density", "必须为正"));
//!     }
//!     Ok(value)
//! }
//!
//! assert!(read_density(-1.0).is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type TiResult<T> = Result<T, TiError>;

/// TurbInflow 错误类型
#[derive(Error, Debug)]
pub enum TiError {
    /// 配置错误（致命）
    #[error("配置错误: {field}: {message}")]
    Configuration {
        /// 出错的配置项
        field: String,
        /// 具体原因
        message: String,
    },

    /// 数值错误（致命）
    #[error("数值错误 [{context}]: {message}")]
    Numerical {
        /// 出错位置（面编号、张量标识等）
        context: String,
        /// 具体原因
        message: String,
    },

    /// 并行一致性错误（致命，所有进程一起终止）
    #[error("并行一致性错误: {message}")]
    ParallelConsistency {
        /// 具体原因
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        /// 可选的底层 IO 错误
        #[source]
        source: Option<std::io::Error>,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl TiError {
    /// 配置错误
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 数值错误
    pub fn numerical(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Numerical {
            context: context.into(),
            message: message.into(),
        }
    }

    /// 并行一致性错误
    pub fn parallel(message: impl Into<String>) -> Self {
        Self::ParallelConsistency {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// IO 错误
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// IO 错误（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TiError {
    fn from(err: std::io::Error) -> Self {
        Self::io_with_source(err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_field() {
        let err = TiError::config("dfsem.density", "必须为正");
        let msg = err.to_string();
        assert!(msg.contains("dfsem.density"));
    }

    #[test]
    fn test_numerical_error_names_context() {
        let err = TiError::numerical("face 12", "R 非半正定");
        assert!(err.to_string().contains("face 12"));
    }

    #[test]
    fn test_io_conversion_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: TiError = io.into();
        assert!(matches!(err, TiError::Io { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }
}
