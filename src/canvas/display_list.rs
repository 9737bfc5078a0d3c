//! 绘制命令记录

use super::{Canvas, Color, Rect};

/// 单条绘制命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawOp {
    Clear(Color),
    FillRect { rect: Rect, color: Color },
}

/// 一帧的绘制命令列表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayList {
    ops: Vec<DrawOp>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// 折叠为（最后一次清屏颜色，之后的矩形）
    ///
    /// 最后一次 `Clear` 之前的命令都会被覆盖，不必提交。
    pub fn flatten(&self) -> (Option<Color>, Vec<(Rect, Color)>) {
        let start = self
            .ops
            .iter()
            .rposition(|op| matches!(op, DrawOp::Clear(_)));

        let clear = start.and_then(|i| match self.ops[i] {
            DrawOp::Clear(color) => Some(color),
            _ => None,
        });

        let rects = self.ops[start.map_or(0, |i| i + 1)..]
            .iter()
            .filter_map(|op| match *op {
                DrawOp::FillRect { rect, color } if !rect.is_empty() => Some((rect, color)),
                _ => None,
            })
            .collect();

        (clear, rects)
    }
}

/// 把绘制命令记录到 `DisplayList` 的画布
#[derive(Debug)]
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    list: DisplayList,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            list: DisplayList::new(),
        }
    }

    /// 取出已记录的命令，画布恢复为空
    pub fn take(&mut self) -> DisplayList {
        std::mem::take(&mut self.list)
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self, color: Color) {
        self.list.push(DrawOp::Clear(color));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.list.push(DrawOp::FillRect { rect, color });
    }
}
