//! DistCanvas - 多后端 2D 画布宿主
//!
//! DistCanvas 把一个持续更新的 2D 场景绘制到原生窗口上，底层可以是
//! OpenGL、Metal、Vulkan、Direct3D 或软件光栅化。核心是渲染上下文的
//! 生命周期管理：随窗口状态创建、重建和释放上下文、渲染目标与绘制表面，
//! 并把重绘请求合并为每个节拍至多一帧。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理）
//! - `canvas`: 画布与表面接口、绘制命令记录、CPU 像素缓冲
//! - `gfx`: 图形后端（能力探测、上下文、渲染目标、wgpu 与软件实现）
//! - `renderer`: 上下文处理器、重绘调度与渲染线程
//!
//! # 使用示例
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dist_canvas::canvas::{Canvas, Color};
//! use dist_canvas::core::config::SchedulerConfig;
//! use dist_canvas::gfx::{FixedBackend, HeadlessFramebuffer, PlatformContextFactory};
//! use dist_canvas::renderer::{ContextHandler, FrameInfo, RenderThread};
//!
//! let factory = PlatformContextFactory::headless(Arc::new(HeadlessFramebuffer::new(1, 640, 480)));
//! let frames = factory.frame_sink();
//! let handler = ContextHandler::new(
//!     Arc::new(FixedBackend::software_only()),
//!     Box::new(factory),
//!     |canvas: &mut dyn Canvas, _frame: &FrameInfo| -> anyhow::Result<()> {
//!         canvas.clear(Color::WHITE);
//!         Ok(())
//!     },
//! );
//!
//! let render = RenderThread::spawn(handler, &SchedulerConfig::default()).unwrap();
//! render.resize(640, 480);
//! render.request_redraw();
//! # let _ = frames.latest();
//! render.shutdown().unwrap();
//! ```

pub mod canvas;
pub mod core;
pub mod gfx;
pub mod renderer;
