use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::canvas::{Canvas, PixelBuffer, RecordingCanvas, Surface};
use crate::core::error::GraphicsError;
use crate::gfx::target::{FramebufferBinding, FramebufferSource, RenderTarget};
use crate::gfx::{GpuContext, GraphicsApi};

/// 一帧已呈现的软件渲染结果
#[derive(Debug, Clone)]
pub struct SoftwareFrame {
    /// 第几次呈现（从 1 开始）
    pub sequence: u64,
    pub framebuffer_id: u64,
    pub pixels: PixelBuffer,
}

/// 软件后端的呈现出口
///
/// 只保留最新一帧。
#[derive(Debug, Clone, Default)]
pub struct FrameSink {
    latest: Arc<Mutex<Option<SoftwareFrame>>>,
}

impl FrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最新呈现的一帧
    pub fn latest(&self) -> Option<SoftwareFrame> {
        self.latest.lock().ok().and_then(|frame| frame.clone())
    }

    /// 已呈现的帧数
    pub fn presented(&self) -> u64 {
        self.latest
            .lock()
            .ok()
            .and_then(|frame| frame.as_ref().map(|f| f.sequence))
            .unwrap_or(0)
    }

    fn publish(&self, framebuffer_id: u64, pixels: PixelBuffer) -> Result<(), GraphicsError> {
        let mut latest = self
            .latest
            .lock()
            .map_err(|_| GraphicsError::Present("frame sink poisoned".to_string()))?;
        let sequence = latest.as_ref().map_or(1, |f| f.sequence + 1);
        *latest = Some(SoftwareFrame {
            sequence,
            framebuffer_id,
            pixels,
        });
        Ok(())
    }
}

/// 软件上下文
pub struct SoftwareContext {
    framebuffer: Arc<dyn FramebufferSource>,
    sink: FrameSink,
}

impl SoftwareContext {
    pub fn new(framebuffer: Arc<dyn FramebufferSource>, sink: FrameSink) -> Self {
        debug!("Software context created");
        Self { framebuffer, sink }
    }
}

impl GpuContext for SoftwareContext {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::Software
    }

    fn framebuffer(&self) -> FramebufferBinding {
        self.framebuffer.query()
    }

    fn make_surface(&mut self, target: &RenderTarget) -> Option<Box<dyn Surface>> {
        if target.width == 0 || target.height == 0 {
            return None;
        }

        Some(Box::new(SoftwareSurface {
            target: *target,
            canvas: RecordingCanvas::new(target.width, target.height),
            pixels: PixelBuffer::new(target.width, target.height, target.color_format),
            sink: self.sink.clone(),
        }))
    }
}

/// 软件表面
///
/// 像素缓冲跨帧保留，未清屏的区域保持上一帧内容。
pub struct SoftwareSurface {
    target: RenderTarget,
    canvas: RecordingCanvas,
    pixels: PixelBuffer,
    sink: FrameSink,
}

impl Surface for SoftwareSurface {
    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn flush_and_present(&mut self) -> Result<(), GraphicsError> {
        let list = self.canvas.take();
        self.pixels.render(&list);
        self.sink.publish(self.target.framebuffer_id, self.pixels.clone())
    }
}
