//! 日志系统模块
//!
//! 基于 `tracing` 提供结构化的日志记录功能。
//! 渲染线程上的每一次生命周期变化（后端探测、上下文创建、渲染目标重建、
//! 过期帧丢弃、上下文丢失、释放）都以结构化字段输出。
//!
//! # 使用示例
//!
//! ```no_run
//! use dist_canvas::core::log;
//! use dist_canvas::core::config::LogLevel;
//!
//! log::init_logger(LogLevel::Info, false, None).expect("logger");
//! tracing::info!(width = 800, height = 600, "Window created");
//! ```

use std::path::Path;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use super::config::LogLevel;
use super::error::{DistCanvasError, Result};

/// 默认日志文件名
const DEFAULT_LOG_FILE: &str = "distcanvas.log";

/// 初始化日志系统
///
/// 必须在程序开始时调用一次；重复调用返回错误而不是 panic。
/// 如果设置了 `RUST_LOG` 环境变量，则优先使用它作为过滤规则。
///
/// # 参数
///
/// * `level` - 日志级别
/// * `file_output` - 是否输出到文件（按天滚动）
/// * `log_file_path` - 日志文件路径（可选，默认为 "distcanvas.log"）
pub fn init_logger(level: LogLevel, file_output: bool, log_file_path: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true);

    let result = if file_output {
        let log_path = log_file_path.unwrap_or(DEFAULT_LOG_FILE);
        let path = Path::new(log_path);
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(DEFAULT_LOG_FILE);

        let file_appender = RollingFileAppender::new(Rotation::DAILY, directory, filename);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false) // 文件不需要 ANSI 颜色
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .try_init()
    };

    result.map_err(|e| DistCanvasError::Initialization(format!("logger: {}", e)))
}

impl LogLevel {
    /// 对应的 `EnvFilter` 指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 日志级别转换
impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}
