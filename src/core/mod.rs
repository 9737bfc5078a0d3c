//! 核心功能模块
//!
//! 本模块提供画布宿主的基础设施：日志系统、配置管理和错误处理。
//! 这些模块独立于具体的图形 API。
//!
//! - `log`：日志系统，基于 tracing 的结构化日志
//! - `config`：配置管理，支持配置文件、环境变量和命令行覆盖
//! - `error`：错误处理，定义统一的错误类型

pub mod config;
pub mod error;
pub mod log;

pub use config::Config;
pub use error::{ConfigError, DistCanvasError, GraphicsError, Result};
