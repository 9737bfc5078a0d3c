//! GPU 上下文接口
//!
//! 每个图形 API 对应一个独立的上下文实现，在构造时按 `GraphicsApi` 选定，
//! 通过 trait object 分发，而不是为每个后端派生一层处理器子类。
//!
//! 上下文由 `ContextHandler` 独占持有：在 `init_context` 成功之后存在，
//! 在 `dispose()`、后端切换或上下文丢失时释放。窗口尺寸变化不会重建上下文。

use std::sync::Arc;

use tracing::warn;
use winit::window::Window;

use super::software::{FrameSink, SoftwareContext};
use super::target::{FramebufferBinding, FramebufferSource, RenderTarget, WindowFramebuffer};
use super::wgpu::{WgpuContext, WgpuOptions};
use super::GraphicsApi;
use crate::canvas::Surface;
use crate::core::error::GraphicsError;

/// 某个图形 API 的设备/上下文
pub trait GpuContext: Send {
    /// 上下文所属的图形 API
    fn api(&self) -> GraphicsApi;

    /// 查询当前窗口帧缓冲绑定
    fn framebuffer(&self) -> FramebufferBinding;

    /// 基于渲染目标创建表面
    ///
    /// 对应外部 2D 库的 `makeFromBackendRenderTarget(context, target, origin, colorFormat, colorSpace)`；
    /// 返回 `None` 表示渲染目标与上下文不匹配。
    fn make_surface(&mut self, target: &RenderTarget) -> Option<Box<dyn Surface>>;
}

/// 按图形 API 创建上下文
pub trait ContextFactory: Send {
    fn create_context(&mut self, api: GraphicsApi) -> Result<Box<dyn GpuContext>, GraphicsError>;
}

/// 平台上下文工厂
///
/// 硬件 API 走 wgpu（限定到对应的 wgpu 后端位），`Software` 走 CPU 光栅化。
/// 没有窗口时只能创建软件上下文。
///
/// 软件后端只把帧发布到 `FrameSink`。绑定窗口时默认不创建软件上下文，
/// 否则回退链会"成功"落在一个什么也不显示的后端上；宿主自己读取
/// `frame_sink()` 并显示帧时用 `with_software_output(true)` 打开。
pub struct PlatformContextFactory {
    window: Option<Arc<Window>>,
    framebuffer: Arc<dyn FramebufferSource>,
    options: WgpuOptions,
    sink: FrameSink,
    software_output: bool,
}

impl PlatformContextFactory {
    /// 绑定到 winit 窗口
    ///
    /// `framebuffer` 由宿主线程构建，尺寸变化时由宿主更新。
    pub fn for_window(window: Arc<Window>, framebuffer: WindowFramebuffer, options: WgpuOptions) -> Self {
        Self {
            window: Some(window),
            framebuffer: Arc::new(framebuffer),
            options,
            sink: FrameSink::new(),
            software_output: false,
        }
    }

    /// 无窗口（只支持软件后端）
    pub fn headless(framebuffer: Arc<dyn FramebufferSource>) -> Self {
        Self {
            window: None,
            framebuffer,
            options: WgpuOptions::default(),
            sink: FrameSink::new(),
            software_output: true,
        }
    }

    /// 宿主是否会显示软件后端发布的帧
    pub fn with_software_output(mut self, enabled: bool) -> Self {
        self.software_output = enabled;
        self
    }

    /// 软件后端呈现的帧
    pub fn frame_sink(&self) -> FrameSink {
        self.sink.clone()
    }
}

impl ContextFactory for PlatformContextFactory {
    fn create_context(&mut self, api: GraphicsApi) -> Result<Box<dyn GpuContext>, GraphicsError> {
        match api {
            GraphicsApi::Software if !self.software_output => {
                warn!("Software frames would not reach the window, skipping the software backend");
                Err(GraphicsError::ContextCreation {
                    api,
                    reason: "software frames are only published to the frame sink, which this host does not display"
                        .to_string(),
                })
            }
            GraphicsApi::Software => Ok(Box::new(SoftwareContext::new(
                self.framebuffer.clone(),
                self.sink.clone(),
            ))),
            hardware => {
                let window = self.window.clone().ok_or_else(|| GraphicsError::ContextCreation {
                    api: hardware,
                    reason: "no window to bind a hardware surface to".to_string(),
                })?;
                let context = WgpuContext::new(
                    hardware,
                    window,
                    self.framebuffer.clone(),
                    self.options.clone(),
                )?;
                Ok(Box::new(context))
            }
        }
    }
}
