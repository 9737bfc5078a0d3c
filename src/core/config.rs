//! 配置管理模块
//!
//! 提供画布宿主配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持环境变量和命令行参数覆盖。
//! 覆盖优先级：命令行 > 环境变量 > 配置文件 > 默认值。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "DistCanvas"
//! resizable = true
//!
//! [graphics]
//! backend = "vulkan"   # metal / opengl / vulkan / direct3d / software，省略则自动探测
//! vsync = true
//! msaa_samples = 1
//! color_format = "bgra8888"
//! color_space = "srgb"
//!
//! [scheduler]
//! frame_interval_ms = 16
//! context_retry_ms = 500
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::{ConfigError, Result};
use crate::gfx::{ColorFormat, ColorSpace, GraphicsApi, SurfaceFormat};

/// 强制指定图形 API 的环境变量
pub const RENDER_API_ENV: &str = "DIST_CANVAS_RENDER_API";

/// 宿主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 重绘调度配置
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 强制使用的图形 API；`None` 表示按平台优先顺序自动探测
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<GraphicsApi>,

    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// MSAA 采样数
    #[serde(default = "default_msaa")]
    pub msaa_samples: u32,

    /// 渲染目标的像素格式
    #[serde(default)]
    pub color_format: ColorFormat,

    /// 渲染目标的颜色空间
    #[serde(default)]
    pub color_space: ColorSpace,
}

/// 重绘调度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 两次绘制之间的最小间隔（毫秒），同一间隔内的重绘请求会被合并
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,

    /// 所有后端都创建失败后，再次尝试创建上下文的间隔（毫秒）
    #[serde(default = "default_context_retry")]
    pub context_retry_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    #[serde(default = "default_file_output")]
    pub file_output: bool,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "DistCanvas".to_string() }
fn default_resizable() -> bool { true }
fn default_vsync() -> bool { true }
fn default_msaa() -> u32 { 1 }
fn default_frame_interval() -> u64 { 16 }
fn default_context_retry() -> u64 { 500 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "distcanvas.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: None,
            vsync: default_vsync(),
            msaa_samples: default_msaa(),
            color_format: ColorFormat::default(),
            color_space: ColorSpace::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval(),
            context_retry_ms: default_context_retry(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl GraphicsConfig {
    /// 渲染目标的表面格式请求
    pub fn surface_format(&self) -> SurfaceFormat {
        SurfaceFormat {
            color_format: self.color_format,
            color_space: self.color_space,
            sample_count: self.msaa_samples,
        }
    }
}

impl SchedulerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn context_retry(&self) -> Duration {
        Duration::from_millis(self.context_retry_ms)
    }
}

impl Config {
    /// 从配置文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从环境变量覆盖图形 API 选择
    ///
    /// 读取 `DIST_CANVAS_RENDER_API`。无法识别的值会被忽略并返回错误信息，
    /// 由调用方决定是否输出警告。
    pub fn apply_env(&mut self) -> std::result::Result<(), String> {
        match std::env::var(RENDER_API_ENV) {
            Ok(value) => self.apply_backend_override(&value),
            Err(_) => Ok(()),
        }
    }

    fn apply_backend_override(&mut self, value: &str) -> std::result::Result<(), String> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            self.graphics.backend = None;
            return Ok(());
        }

        let api = value.parse::<GraphicsApi>()?;
        self.graphics.backend = Some(api);
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--backend <api>`: 强制使用指定的图形 API（`auto` 恢复自动探测）
    /// - `--software`: 强制使用软件后端
    /// - `--width <value>` / `--height <value>`: 设置窗口尺寸
    /// - `--msaa <value>`: 设置 MSAA 采样数
    ///
    /// 无法识别的 `--backend` 不会中断其余参数的应用，错误在最后返回，
    /// 由调用方在日志系统就绪后输出。
    pub fn apply_args<I>(&mut self, args: I) -> std::result::Result<(), String>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        let backend = match arg_value(&args, "--backend") {
            Some(value) => self.apply_backend_override(value),
            None => Ok(()),
        };

        if args.iter().any(|a| a == "--software") {
            self.graphics.backend = Some(GraphicsApi::Software);
        }

        if let Some(width) = arg_value(&args, "--width").and_then(|v| v.parse().ok()) {
            self.window.width = width;
        }

        if let Some(height) = arg_value(&args, "--height").and_then(|v| v.parse().ok()) {
            self.window.height = height;
        }

        if let Some(samples) = arg_value(&args, "--msaa").and_then(|v| v.parse().ok()) {
            self.graphics.msaa_samples = samples;
        }

        backend
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }
            .into());
        }

        if !matches!(self.graphics.msaa_samples, 1 | 2 | 4 | 8 | 16) {
            return Err(ConfigError::InvalidValue {
                field: "graphics.msaa_samples".to_string(),
                reason: "MSAA samples must be 1, 2, 4, 8, or 16".to_string(),
            }
            .into());
        }

        if self.scheduler.frame_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.frame_interval_ms".to_string(),
                reason: "Frame interval must be at least 1 ms".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1).map(String::as_str)
}
