//! CPU 像素缓冲
//!
//! 软件后端用它执行 `DisplayList`：纯色清屏 + 矩形填充（source-over 混合）。
//! 矩形按像素中心采样，不做抗锯齿。

use super::{Color, DisplayList, DrawOp, Rect};
use crate::gfx::ColorFormat;

/// 按行存储的 8 位四通道像素缓冲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: ColorFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, format: ColorFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ColorFormat {
        self.format
    }

    /// 原始字节（按 `format` 的通道顺序）
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 读取像素，总是以 RGBA 顺序返回
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        let p = [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]];
        Some(self.swizzle(p))
    }

    /// 执行一帧的绘制命令
    pub fn render(&mut self, list: &DisplayList) {
        for op in list.ops() {
            match *op {
                DrawOp::Clear(color) => self.clear(color),
                DrawOp::FillRect { rect, color } => self.fill_rect(rect, color),
            }
        }
    }

    fn clear(&mut self, color: Color) {
        let px = self.swizzle(color.to_rgba8());
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() || color.a <= 0.0 {
            return;
        }

        // 像素中心 (x + 0.5) 落在矩形内才覆盖
        let span = |lo: f32, hi: f32, max: u32| -> (u32, u32) {
            let start = (lo - 0.5).ceil().max(0.0) as u32;
            let end = ((hi - 0.5).ceil().max(0.0) as u32).min(max);
            (start.min(end), end)
        };
        let (x0, x1) = span(rect.x, rect.right(), self.width);
        let (y0, y1) = span(rect.y, rect.bottom(), self.height);

        let src = color.to_rgba8();
        let alpha = src[3] as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                let i = self.offset(x, y);
                let dst = self.swizzle([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]);
                let out = if alpha == 255 {
                    src
                } else {
                    blend(src, dst, alpha)
                };
                let out = self.swizzle(out);
                self.data[i..i + 4].copy_from_slice(&out);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// RGBA 与存储顺序互换（对称操作）
    fn swizzle(&self, p: [u8; 4]) -> [u8; 4] {
        match self.format {
            ColorFormat::Rgba8888 => p,
            ColorFormat::Bgra8888 => [p[2], p[1], p[0], p[3]],
        }
    }
}

fn blend(src: [u8; 4], dst: [u8; 4], alpha: u32) -> [u8; 4] {
    let inv = 255 - alpha;
    let mix = |s: u8, d: u8| ((s as u32 * alpha + d as u32 * inv + 127) / 255) as u8;
    [
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        (alpha + (dst[3] as u32 * inv + 127) / 255).min(255) as u8,
    ]
}
