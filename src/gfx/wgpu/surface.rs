use std::sync::Arc;

use tracing::{trace, warn};
use wgpu::util::DeviceExt;

use super::context::Gpu;
use super::vertex::{target_color, tessellate};
use crate::canvas::{Canvas, RecordingCanvas, Surface};
use crate::core::error::GraphicsError;
use crate::gfx::target::RenderTarget;

/// 交换链表面
///
/// 画布命令先记录下来，`flush_and_present` 时一次性编码为一个渲染通道。
pub struct WgpuSurface {
    gpu: Arc<Gpu>,
    config: wgpu::SurfaceConfiguration,
    pipeline: Arc<wgpu::RenderPipeline>,
    target: RenderTarget,
    canvas: RecordingCanvas,
    /// 多重采样颜色缓冲，每帧解析到交换链图像
    msaa_view: Option<wgpu::TextureView>,
}

impl WgpuSurface {
    pub(super) fn new(
        gpu: Arc<Gpu>,
        config: wgpu::SurfaceConfiguration,
        pipeline: Arc<wgpu::RenderPipeline>,
        target: RenderTarget,
    ) -> Self {
        let msaa_view = (target.sample_count > 1).then(|| {
            gpu.device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("Canvas MSAA Texture"),
                    size: wgpu::Extent3d {
                        width: config.width,
                        height: config.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: target.sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: config.format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        Self {
            canvas: RecordingCanvas::new(target.width, target.height),
            gpu,
            config,
            pipeline,
            target,
            msaa_view,
        }
    }

    fn acquire(&self) -> Result<wgpu::SurfaceTexture, GraphicsError> {
        match self.gpu.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                warn!("Swapchain out of date, reconfiguring");
                self.gpu.surface.configure(&self.gpu.device, &self.config);
                Err(GraphicsError::SurfaceLost(
                    "swapchain lost or outdated".to_string(),
                ))
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                Err(GraphicsError::ContextLost("out of memory".to_string()))
            }
            Err(e) => Err(GraphicsError::Present(format!(
                "Failed to acquire next image: {}",
                e
            ))),
        }
    }
}

impl Surface for WgpuSurface {
    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn flush_and_present(&mut self) -> Result<(), GraphicsError> {
        let list = self.canvas.take();
        let (clear, rects) = list.flatten();

        let frame = self.acquire()?;
        let frame_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let vertices = tessellate(
            &rects,
            self.target.width,
            self.target.height,
            self.target.origin,
            self.target.color_space,
        );
        trace!("Flushing {} rects ({} vertices)", rects.len(), vertices.len());

        let vertex_buffer = (!vertices.is_empty()).then(|| {
            self.gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Canvas Vertex Buffer"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        let load = match clear {
            Some(color) => {
                let [r, g, b, a] = target_color(color, self.target.color_space);
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                })
            }
            None => wgpu::LoadOp::Load,
        };

        let (view, resolve_target) = match &self.msaa_view {
            Some(msaa) => (msaa, Some(&frame_view)),
            None => (&frame_view, None),
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Canvas Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Canvas Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(buffer) = &vertex_buffer {
                pass.set_pipeline(&self.pipeline);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..vertices.len() as u32, 0..1);
            }
        }

        self.gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
