//! wgpu 硬件后端
//!
//! OpenGL、Metal、Vulkan、Direct3D 四个硬件 API 都经由 wgpu 实现，
//! 每个上下文只开启对应的 wgpu 后端位。
//!
//! # 模块结构
//!
//! - `context` - WgpuContext（设备初始化、表面格式协商、管线缓存）
//! - `surface` - WgpuSurface（记录画布命令并提交到交换链）
//! - `vertex` - 矩形顶点与颜色空间换算

mod context;
mod surface;
mod vertex;

pub use context::{backends_for, texture_format, WgpuContext, WgpuOptions};
pub use surface::WgpuSurface;
pub use vertex::{tessellate, RectVertex};
