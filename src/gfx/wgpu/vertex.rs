//! 矩形顶点数据
//!
//! 画布坐标（像素，原点左上）在 CPU 端直接换算到 NDC，
//! 着色器不需要 uniform。

use bytemuck::{Pod, Zeroable};

use crate::canvas::{Color, Rect};
use crate::gfx::target::{ColorSpace, SurfaceOrigin};

/// 顶点结构体
///
/// - `position`：NDC 坐标 [x, y]
/// - `color`：RGBA，已按目标颜色空间换算
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RectVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl RectVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<RectVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// 画布颜色换算为写入目标时使用的分量
///
/// 画布颜色按 sRGB 编码给出；sRGB 格式的纹理在写入时会再编码一次，
/// 所以这里先解码为线性值。
pub fn target_color(color: Color, space: ColorSpace) -> [f32; 4] {
    match space {
        ColorSpace::Srgb => [
            srgb_to_linear(color.r),
            srgb_to_linear(color.g),
            srgb_to_linear(color.b),
            color.a.clamp(0.0, 1.0),
        ],
        ColorSpace::Linear => [
            color.r.clamp(0.0, 1.0),
            color.g.clamp(0.0, 1.0),
            color.b.clamp(0.0, 1.0),
            color.a.clamp(0.0, 1.0),
        ],
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// 把矩形列表展开为三角形列表（每个矩形 6 个顶点）
pub fn tessellate(
    rects: &[(Rect, Color)],
    width: u32,
    height: u32,
    origin: SurfaceOrigin,
    space: ColorSpace,
) -> Vec<RectVertex> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let (w, h) = (width as f32, height as f32);
    let to_ndc = |x: f32, y: f32| -> [f32; 2] {
        let nx = x / w * 2.0 - 1.0;
        let ny = match origin {
            SurfaceOrigin::TopLeft => 1.0 - y / h * 2.0,
            SurfaceOrigin::BottomLeft => y / h * 2.0 - 1.0,
        };
        [nx, ny]
    };

    let mut vertices = Vec::with_capacity(rects.len() * 6);
    for &(rect, color) in rects {
        let color = target_color(color, space);
        let tl = to_ndc(rect.x, rect.y);
        let tr = to_ndc(rect.right(), rect.y);
        let bl = to_ndc(rect.x, rect.bottom());
        let br = to_ndc(rect.right(), rect.bottom());

        for position in [tl, bl, tr, tr, bl, br] {
            vertices.push(RectVertex { position, color });
        }
    }
    vertices
}
