//! 渲染器模块
//!
//! 本模块负责渲染上下文的生命周期和重绘调度，与具体图形 API 无关；
//! 具体的上下文实现在 `gfx` 模块中，按 API 分类组织。
//!
//! # 架构设计
//!
//! - `ContextHandler`：持有上下文、渲染目标与绘制表面，保持它们与窗口状态一致
//! - `RedrawScheduler`：合并重绘请求，每个节拍至多绘制一次
//! - `RenderThread`：独占处理器的渲染线程，宿主只发送意图

pub mod generation;
pub mod handler;
pub mod metrics;
pub mod scheduler;
pub mod thread;

#[cfg(test)]
pub(crate) mod testing;

pub use generation::{Generation, GenerationCounter};
pub use handler::{ContextHandler, DrawOutcome, DrawSurface, FrameInfo, Painter, SkipReason};
pub use metrics::FrameStats;
pub use scheduler::{FramePacer, FrameTicket, RedrawHandle, RedrawScheduler};
pub use thread::{RenderEvent, RenderIntent, RenderThread};
