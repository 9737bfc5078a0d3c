//! 图形 API 标识
//!
//! `GraphicsApi` 在一个 `ContextHandler` 的生命周期内保持不变，
//! 除非显式请求切换后端（完整销毁后重建）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 支持的图形 API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsApi {
    #[serde(rename = "opengl")]
    OpenGl,
    Metal,
    Vulkan,
    #[serde(rename = "direct3d")]
    Direct3D,
    /// CPU 光栅化，所有平台都可用的最后退路
    Software,
}

impl GraphicsApi {
    pub const ALL: [GraphicsApi; 5] = [
        GraphicsApi::OpenGl,
        GraphicsApi::Metal,
        GraphicsApi::Vulkan,
        GraphicsApi::Direct3D,
        GraphicsApi::Software,
    ];

    /// 获取 API 名称
    pub fn name(&self) -> &'static str {
        match self {
            GraphicsApi::OpenGl => "OpenGL",
            GraphicsApi::Metal => "Metal",
            GraphicsApi::Vulkan => "Vulkan",
            GraphicsApi::Direct3D => "Direct3D",
            GraphicsApi::Software => "Software",
        }
    }

    /// 是否为硬件加速 API
    pub fn is_hardware(&self) -> bool {
        !matches!(self, GraphicsApi::Software)
    }
}

impl fmt::Display for GraphicsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GraphicsApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opengl" | "gl" => Ok(GraphicsApi::OpenGl),
            "metal" => Ok(GraphicsApi::Metal),
            "vulkan" | "vk" => Ok(GraphicsApi::Vulkan),
            "direct3d" | "d3d" | "d3d12" | "dx12" => Ok(GraphicsApi::Direct3D),
            "software" | "sw" | "cpu" => Ok(GraphicsApi::Software),
            other => Err(format!("unknown graphics api '{}'", other)),
        }
    }
}
