//! 画布契约
//!
//! 外部 2D 图形库通过一个很窄的契约接入：
//! 创建表面（`GpuContext::make_surface`）→ 获取画布（`Surface::canvas`）→ 刷新（`Surface::flush_and_present`）。
//!
//! 本 crate 自带的两个表面实现（wgpu、软件）都先把绘制命令记录到 `DisplayList`，
//! 在刷新时再统一提交。

mod display_list;
mod raster;

pub use display_list::{DisplayList, DrawOp, RecordingCanvas};
pub use raster::PixelBuffer;

use crate::core::error::GraphicsError;

/// RGBA 颜色（每通道 0.0 - 1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    /// 转换为 8 位 RGBA
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

/// 轴对齐矩形（像素坐标，原点在左上角）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// 一帧的绘制命令接口
///
/// 画布只在一次 `draw()` 调用期间有效，绘制回调不能持有它。
pub trait Canvas {
    /// 画布宽度（像素）
    fn width(&self) -> u32;

    /// 画布高度（像素）
    fn height(&self) -> u32;

    /// 用纯色填满整个画布
    fn clear(&mut self, color: Color);

    /// 填充矩形
    fn fill_rect(&mut self, rect: Rect, color: Color);
}

/// 外部 2D 图形库创建的表面
///
/// 与某一代 `RenderTarget` 绑定，渲染目标重建时随之释放。
pub trait Surface: Send {
    /// 本帧的画布
    fn canvas(&mut self) -> &mut dyn Canvas;

    /// 刷新挂起的 GPU 命令并呈现
    fn flush_and_present(&mut self) -> Result<(), GraphicsError>;
}
