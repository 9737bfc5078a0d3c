//! 渲染目标描述
//!
//! `RenderTarget` 描述与当前窗口帧缓冲绑定的可绘制表面：尺寸、像素格式、
//! 采样数、颜色空间和原点约定。几何尺寸或格式变化时整体重建，从不原地修改。

use std::sync::{Arc, Mutex};

use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use serde::{Deserialize, Serialize};
use winit::window::Window;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    /// 每通道 8 位，B-G-R-A 字节顺序（大多数交换链的原生格式）
    #[default]
    Bgra8888,
    /// 每通道 8 位，R-G-B-A 字节顺序
    Rgba8888,
}

/// 颜色空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

/// 帧缓冲原点约定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceOrigin {
    TopLeft,
    /// OpenGL 默认帧缓冲的约定
    BottomLeft,
}

/// 窗口帧缓冲查询结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferBinding {
    /// 当前绑定的可绘制对象的原生句柄/ID
    pub id: u64,
    /// 像素宽度
    pub width: u32,
    /// 像素高度
    pub height: u32,
    /// 帧缓冲支持的最大采样数
    pub max_samples: u32,
    pub origin: SurfaceOrigin,
}

/// 窗口帧缓冲查询
///
/// 每次 `ensure_canvas` 重建渲染目标时调用一次。
pub trait FramebufferSource: Send + Sync {
    fn query(&self) -> FramebufferBinding;
}

/// 基于 winit 窗口的帧缓冲查询
///
/// 原生句柄 ID 和初始尺寸在构造时读取一次，之后的尺寸由宿主通过 `resize` 推送。
/// `query` 不再访问窗口，渲染线程上不会同步等待主线程。
#[derive(Debug, Clone)]
pub struct WindowFramebuffer {
    id: u64,
    size: Arc<Mutex<(u32, u32)>>,
}

impl WindowFramebuffer {
    /// 在拥有窗口的线程上调用
    pub fn new(window: &Window) -> Self {
        let size = window.inner_size();
        Self::from_parts(native_id(window), size.width, size.height)
    }

    pub fn from_parts(id: u64, width: u32, height: u32) -> Self {
        Self {
            id,
            size: Arc::new(Mutex::new((width, height))),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// 宿主收到窗口尺寸变化时调用
    pub fn resize(&self, width: u32, height: u32) {
        if let Ok(mut size) = self.size.lock() {
            *size = (width, height);
        }
    }
}

/// 从原生窗口句柄中提取一个稳定的数值 ID
fn native_id(window: &Window) -> u64 {
    let Ok(handle) = window.window_handle() else {
        return 0;
    };

    match handle.as_raw() {
        RawWindowHandle::Win32(h) => h.hwnd.get() as u64,
        RawWindowHandle::AppKit(h) => h.ns_view.as_ptr() as usize as u64,
        RawWindowHandle::UiKit(h) => h.ui_view.as_ptr() as usize as u64,
        RawWindowHandle::Xlib(h) => h.window as u64,
        RawWindowHandle::Xcb(h) => h.window.get() as u64,
        RawWindowHandle::Wayland(h) => h.surface.as_ptr() as usize as u64,
        _ => 0,
    }
}

impl FramebufferSource for WindowFramebuffer {
    fn query(&self) -> FramebufferBinding {
        let (width, height) = self.size.lock().map(|s| *s).unwrap_or((0, 0));
        FramebufferBinding {
            id: self.id,
            width,
            height,
            max_samples: 16,
            origin: SurfaceOrigin::TopLeft,
        }
    }
}

/// 无窗口的帧缓冲（软件后端、离屏渲染、测试）
///
/// 尺寸由宿主通过 `resize` 更新。
#[derive(Debug, Clone)]
pub struct HeadlessFramebuffer {
    id: u64,
    size: Arc<Mutex<(u32, u32)>>,
}

impl HeadlessFramebuffer {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self {
            id,
            size: Arc::new(Mutex::new((width, height))),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        if let Ok(mut size) = self.size.lock() {
            *size = (width, height);
        }
    }
}

impl FramebufferSource for HeadlessFramebuffer {
    fn query(&self) -> FramebufferBinding {
        let (width, height) = self.size.lock().map(|s| *s).unwrap_or((0, 0));
        FramebufferBinding {
            id: self.id,
            width,
            height,
            max_samples: 1,
            origin: SurfaceOrigin::TopLeft,
        }
    }
}

/// 表面格式请求（格式 + 颜色空间 + 采样数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub color_format: ColorFormat,
    pub color_space: ColorSpace,
    pub sample_count: u32,
}

impl Default for SurfaceFormat {
    fn default() -> Self {
        Self {
            color_format: ColorFormat::default(),
            color_space: ColorSpace::default(),
            sample_count: 1,
        }
    }
}

/// 渲染目标
///
/// 宽高总是等于最近一次成功重建时观察到的窗口可绘制尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub color_format: ColorFormat,
    pub color_space: ColorSpace,
    pub origin: SurfaceOrigin,
    /// 绑定的帧缓冲 ID
    pub framebuffer_id: u64,
}

impl RenderTarget {
    /// 基于帧缓冲绑定构建渲染目标
    ///
    /// 采样数被限制在帧缓冲支持的范围内。
    pub fn new(width: u32, height: u32, format: SurfaceFormat, binding: &FramebufferBinding) -> Self {
        Self {
            width,
            height,
            sample_count: format.sample_count.clamp(1, binding.max_samples.max(1)),
            color_format: format.color_format,
            color_space: format.color_space,
            origin: binding.origin,
            framebuffer_id: binding.id,
        }
    }

    /// 尺寸和格式是否与请求一致
    pub fn matches(&self, width: u32, height: u32, format: &SurfaceFormat) -> bool {
        self.width == width
            && self.height == height
            && self.color_format == format.color_format
            && self.color_space == format.color_space
    }
}
