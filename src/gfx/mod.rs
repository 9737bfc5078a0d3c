//! 图形后端模块
//!
//! - `api`：图形 API 枚举
//! - `backend`：平台能力探测与后端优先顺序
//! - `context`：GPU 上下文接口与平台工厂
//! - `target`：渲染目标与帧缓冲描述
//! - `wgpu`：OpenGL / Metal / Vulkan / Direct3D 硬件上下文
//! - `software`：CPU 光栅化上下文

pub mod api;
pub mod backend;
pub mod context;
pub mod software;
pub mod target;
pub mod wgpu;

pub use api::GraphicsApi;
pub use backend::{platform_preferred_order, FixedBackend, GraphicsBackend, SystemBackend};
pub use context::{ContextFactory, GpuContext, PlatformContextFactory};
pub use software::{FrameSink, SoftwareContext, SoftwareFrame};
pub use target::{
    ColorFormat, ColorSpace, FramebufferBinding, FramebufferSource, HeadlessFramebuffer,
    RenderTarget, SurfaceFormat, SurfaceOrigin, WindowFramebuffer,
};
pub use self::wgpu::{WgpuContext, WgpuOptions};
