//! 表面代数
//!
//! 每次成功创建上下文或重建渲染目标时递增。重绘请求携带提交时的代数，
//! 绘制时若代数已被超越则丢弃（超越它的那次重建会自行安排新的重绘）。
//!
//! 计数器由渲染线程写、任意线程读。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 代数值
///
/// 单调递增。`Generation::ZERO` 表示尚未建立任何表面。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub const ZERO: Generation = Generation(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 共享的代数计数器
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }

    /// 递增并返回新的代数
    pub fn bump(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// 给定代数是否已被超越
    pub fn is_stale(&self, generation: Generation) -> bool {
        generation < self.current()
    }
}
