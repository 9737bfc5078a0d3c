//! wgpu 硬件上下文
//!
//! 一个 `WgpuContext` 对应一个图形 API：实例只开启该 API 对应的 wgpu 后端位，
//! 因此 OpenGL / Metal / Vulkan / Direct3D 各自独立初始化，失败即整体失败，
//! 由处理器继续尝试下一个 API。
//!
//! 初始化步骤：
//! - 创建限定后端的 wgpu 实例
//! - 创建窗口表面
//! - 选择兼容该表面的适配器
//! - 创建逻辑设备和命令队列

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use winit::window::Window;

use super::surface::WgpuSurface;
use super::vertex::RectVertex;
use crate::canvas::Surface;
use crate::core::error::GraphicsError;
use crate::gfx::target::{
    ColorFormat, ColorSpace, FramebufferBinding, FramebufferSource, RenderTarget,
};
use crate::gfx::{GpuContext, GraphicsApi};

/// wgpu 上下文选项
#[derive(Debug, Clone)]
pub struct WgpuOptions {
    /// 垂直同步（Fifo 呈现模式）
    pub vsync: bool,
}

impl Default for WgpuOptions {
    fn default() -> Self {
        Self { vsync: true }
    }
}

/// 上下文与其表面共享的设备对象
pub(super) struct Gpu {
    // 表面依赖实例存活
    _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

/// 图形 API 到 wgpu 后端位的映射
pub fn backends_for(api: GraphicsApi) -> Option<wgpu::Backends> {
    match api {
        GraphicsApi::OpenGl => Some(wgpu::Backends::GL),
        GraphicsApi::Metal => Some(wgpu::Backends::METAL),
        GraphicsApi::Vulkan => Some(wgpu::Backends::VULKAN),
        GraphicsApi::Direct3D => Some(wgpu::Backends::DX12),
        GraphicsApi::Software => None,
    }
}

/// 像素格式 + 颜色空间到纹理格式的映射
pub fn texture_format(format: ColorFormat, space: ColorSpace) -> wgpu::TextureFormat {
    match (format, space) {
        (ColorFormat::Bgra8888, ColorSpace::Srgb) => wgpu::TextureFormat::Bgra8UnormSrgb,
        (ColorFormat::Bgra8888, ColorSpace::Linear) => wgpu::TextureFormat::Bgra8Unorm,
        (ColorFormat::Rgba8888, ColorSpace::Srgb) => wgpu::TextureFormat::Rgba8UnormSrgb,
        (ColorFormat::Rgba8888, ColorSpace::Linear) => wgpu::TextureFormat::Rgba8Unorm,
    }
}

/// wgpu 硬件上下文
pub struct WgpuContext {
    api: GraphicsApi,
    gpu: Arc<Gpu>,
    framebuffer: Arc<dyn FramebufferSource>,
    capabilities: wgpu::SurfaceCapabilities,
    present_mode: wgpu::PresentMode,
    shader: wgpu::ShaderModule,
    /// 按（纹理格式，采样数）缓存的管线；窗口尺寸变化不需要重建管线
    pipelines: HashMap<(wgpu::TextureFormat, u32), Arc<wgpu::RenderPipeline>>,
}

impl WgpuContext {
    pub fn new(
        api: GraphicsApi,
        window: Arc<Window>,
        framebuffer: Arc<dyn FramebufferSource>,
        options: WgpuOptions,
    ) -> Result<Self, GraphicsError> {
        let creation = |reason: String| GraphicsError::ContextCreation { api, reason };

        let backends =
            backends_for(api).ok_or_else(|| creation("not a hardware API".to_string()))?;

        info!("Initializing {} context", api);

        debug!("Creating wgpu instance");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            dx12_shader_compiler: Default::default(),
            flags: wgpu::InstanceFlags::default(),
            gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
        });

        debug!("Creating surface");
        let surface = instance
            .create_surface(window)
            .map_err(|e| creation(format!("Failed to create surface: {}", e)))?;

        debug!("Requesting adapter");
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| creation("Failed to find suitable adapter".to_string()))?;

        info!("Selected adapter: {:?}", adapter.get_info());

        debug!("Requesting device and queue");
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Canvas Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        ))
        .map_err(|e| creation(format!("Failed to create device: {}", e)))?;

        let capabilities = surface.get_capabilities(&adapter);
        if capabilities.formats.is_empty() {
            return Err(creation("Surface is not supported by the adapter".to_string()));
        }
        debug!("Surface formats: {:?}", capabilities.formats);

        let present_mode = choose_present_mode(&capabilities, options.vsync);
        debug!("Present mode: {:?}", present_mode);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Canvas Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/canvas.wgsl").into()),
        });

        info!("{} context initialized", api);

        Ok(Self {
            api,
            gpu: Arc::new(Gpu {
                _instance: instance,
                surface,
                adapter,
                device,
                queue,
            }),
            framebuffer,
            capabilities,
            present_mode,
            shader,
            pipelines: HashMap::new(),
        })
    }

    fn pipeline(&mut self, format: wgpu::TextureFormat, samples: u32) -> Arc<wgpu::RenderPipeline> {
        let device = &self.gpu.device;
        let shader = &self.shader;
        self.pipelines
            .entry((format, samples))
            .or_insert_with(|| {
                debug!("Creating canvas pipeline for {:?} x{}", format, samples);
                Arc::new(create_pipeline(device, shader, format, samples))
            })
            .clone()
    }

    fn supports_samples(&self, format: wgpu::TextureFormat, samples: u32) -> bool {
        samples <= 1
            || self
                .gpu
                .adapter
                .get_texture_format_features(format)
                .flags
                .sample_count_supported(samples)
    }
}

impl GpuContext for WgpuContext {
    fn api(&self) -> GraphicsApi {
        self.api
    }

    fn framebuffer(&self) -> FramebufferBinding {
        self.framebuffer.query()
    }

    fn make_surface(&mut self, target: &RenderTarget) -> Option<Box<dyn Surface>> {
        if target.width == 0 || target.height == 0 {
            return None;
        }

        let binding = self.framebuffer.query();
        if binding.id != target.framebuffer_id {
            warn!(
                "Render target is bound to framebuffer {} but the window exposes {}",
                target.framebuffer_id, binding.id
            );
            return None;
        }

        let format = texture_format(target.color_format, target.color_space);
        if !self.capabilities.formats.contains(&format) {
            warn!("Surface format {:?} is not supported by {}", format, self.api);
            return None;
        }

        if !self.supports_samples(format, target.sample_count) {
            warn!("{}x MSAA is not supported for {:?}", target.sample_count, format);
            return None;
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: target.width,
            height: target.height,
            present_mode: self.present_mode,
            alpha_mode: self
                .capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        self.gpu.surface.configure(&self.gpu.device, &config);

        let pipeline = self.pipeline(format, target.sample_count);
        Some(Box::new(WgpuSurface::new(self.gpu.clone(), config, pipeline, *target)))
    }
}

fn choose_present_mode(caps: &wgpu::SurfaceCapabilities, vsync: bool) -> wgpu::PresentMode {
    if vsync {
        return wgpu::PresentMode::Fifo;
    }

    [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
        .into_iter()
        .find(|mode| caps.present_modes.contains(mode))
        .unwrap_or(wgpu::PresentMode::Fifo)
}

fn create_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    samples: u32,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Canvas Pipeline Layout"),
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Canvas Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[RectVertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // 矩形绕序随原点约定变化
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: samples,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_bits() {
        assert_eq!(backends_for(GraphicsApi::Vulkan), Some(wgpu::Backends::VULKAN));
        assert_eq!(backends_for(GraphicsApi::Direct3D), Some(wgpu::Backends::DX12));
        assert_eq!(backends_for(GraphicsApi::Software), None);
    }

    #[test]
    fn test_texture_format_mapping() {
        assert_eq!(
            texture_format(ColorFormat::Bgra8888, ColorSpace::Srgb),
            wgpu::TextureFormat::Bgra8UnormSrgb
        );
        assert_eq!(
            texture_format(ColorFormat::Rgba8888, ColorSpace::Linear),
            wgpu::TextureFormat::Rgba8Unorm
        );
    }
}
