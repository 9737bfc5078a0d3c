//! 错误处理模块
//!
//! 定义了画布宿主中使用的统一错误类型。
//!
//! # 错误分类
//!
//! - 后端不可用、上下文创建失败：在 `init_context` 内部就地恢复，尝试下一个后端
//! - 表面创建失败：`ensure_canvas` 返回可恢复错误，下一次调用时重试
//! - 绘制回调错误：在刷新/呈现之后原样传递给宿主应用

use std::fmt;

use crate::gfx::GraphicsApi;

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, DistCanvasError>;

/// DistCanvas 的错误类型
#[derive(Debug)]
pub enum DistCanvasError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// 绘制回调返回的错误
    Paint(anyhow::Error),

    /// IO 错误
    Io(std::io::Error),

    /// 初始化错误
    Initialization(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// 当前平台不支持该图形 API
    BackendUnavailable(GraphicsApi),

    /// 设备/上下文创建失败
    ContextCreation { api: GraphicsApi, reason: String },

    /// 尚未创建上下文
    NoContext,

    /// 外部 2D 库无法基于渲染目标创建表面
    SurfaceCreation(String),

    /// 交换链过期或丢失，需要重建渲染目标
    SurfaceLost(String),

    /// 设备丢失，需要重建整个上下文
    ContextLost(String),

    /// 呈现失败（本帧跳过）
    Present(String),
}

impl GraphicsError {
    /// 是否需要销毁并重建上下文
    pub fn is_context_loss(&self) -> bool {
        matches!(self, GraphicsError::ContextLost(_))
    }
}

impl DistCanvasError {
    /// 如果是图形错误，返回其引用
    pub fn as_graphics(&self) -> Option<&GraphicsError> {
        match self {
            DistCanvasError::Graphics(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for DistCanvasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistCanvasError::Config(e) => write!(f, "Configuration error: {}", e),
            DistCanvasError::Graphics(e) => write!(f, "Graphics error: {}", e),
            DistCanvasError::Paint(e) => write!(f, "Paint callback failed: {:#}", e),
            DistCanvasError::Io(e) => write!(f, "IO error: {}", e),
            DistCanvasError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::BackendUnavailable(api) => {
                write!(f, "{} is not available on this platform", api.name())
            }
            GraphicsError::ContextCreation { api, reason } => {
                write!(f, "Failed to create {} context: {}", api.name(), reason)
            }
            GraphicsError::NoContext => write!(f, "No graphics context has been created"),
            GraphicsError::SurfaceCreation(msg) => write!(f, "Cannot create surface: {}", msg),
            GraphicsError::SurfaceLost(msg) => write!(f, "Surface lost: {}", msg),
            GraphicsError::ContextLost(msg) => write!(f, "Context lost: {}", msg),
            GraphicsError::Present(msg) => write!(f, "Present failed: {}", msg),
        }
    }
}

impl std::error::Error for DistCanvasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DistCanvasError::Io(e) => Some(e),
            DistCanvasError::Config(e) => Some(e),
            DistCanvasError::Graphics(e) => Some(e),
            DistCanvasError::Paint(e) => Some(&**e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}

impl From<std::io::Error> for DistCanvasError {
    fn from(err: std::io::Error) -> Self {
        DistCanvasError::Io(err)
    }
}

impl From<ConfigError> for DistCanvasError {
    fn from(err: ConfigError) -> Self {
        DistCanvasError::Config(err)
    }
}

impl From<GraphicsError> for DistCanvasError {
    fn from(err: GraphicsError) -> Self {
        DistCanvasError::Graphics(err)
    }
}
