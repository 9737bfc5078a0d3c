//! 重绘调度
//!
//! 把"有东西变了"的信号与实际的绘制调用解耦：
//!
//! - `RedrawHandle::request_redraw` 可在任意线程调用，只设置一个待绘制标记，
//!   第一次设置时向渲染线程发一个门铃信号（容量为 1 的 crossbeam 通道）
//! - 渲染线程每个节拍调用一次 `take_tick`，同一节拍内的多次请求合并为一帧
//! - 标记在绘制开始前清除，因此绘制过程中到达的请求会恰好再触发一帧
//!
//! 节拍按固定最小间隔推进（`FramePacer`），持续的请求流仍然每个间隔出一帧。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::trace;

use super::generation::{Generation, GenerationCounter};
use super::handler::{ContextHandler, DrawOutcome};
use crate::core::error::Result;

#[derive(Debug, Default)]
struct Shared {
    pending: AtomicBool,
    /// 待绘制请求中最大的代数
    target: AtomicU64,
    disposed: AtomicBool,
    requests: AtomicU64,
}

/// 跨线程的重绘请求句柄
#[derive(Debug, Clone)]
pub struct RedrawHandle {
    shared: Arc<Shared>,
    generations: GenerationCounter,
    doorbell: Sender<()>,
}

impl RedrawHandle {
    /// 请求重绘（不阻塞）
    ///
    /// 调度器已销毁时返回 `false`。
    pub fn request_redraw(&self) -> bool {
        if self.shared.disposed.load(Ordering::Acquire) {
            return false;
        }

        let generation = self.generations.current();
        self.shared
            .target
            .fetch_max(generation.value(), Ordering::AcqRel);
        self.shared.requests.fetch_add(1, Ordering::Relaxed);

        if !self.shared.pending.swap(true, Ordering::AcqRel) {
            // 门铃已满说明渲染线程还没醒，无需再敲
            let _ = self.doorbell.try_send(());
        }
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }
}

/// 一个节拍取出的绘制许可
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    generation: Generation,
}

impl FrameTicket {
    /// 合并进这一帧的请求中最新的代数
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// 固定间隔节拍
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    last: Option<Instant>,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        self.time_until_ready(now).is_zero()
    }

    pub fn time_until_ready(&self, now: Instant) -> Duration {
        match self.last {
            Some(last) => (last + self.interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

/// 重绘调度器，由渲染线程持有
pub struct RedrawScheduler {
    shared: Arc<Shared>,
    generations: GenerationCounter,
    doorbell_tx: Sender<()>,
    doorbell: Receiver<()>,
    pacer: FramePacer,
    ticks: u64,
}

impl RedrawScheduler {
    pub fn new(generations: GenerationCounter, frame_interval: Duration) -> Self {
        let (doorbell_tx, doorbell) = bounded(1);
        Self {
            shared: Arc::new(Shared::default()),
            generations,
            doorbell_tx,
            doorbell,
            pacer: FramePacer::new(frame_interval),
            ticks: 0,
        }
    }

    pub fn handle(&self) -> RedrawHandle {
        RedrawHandle {
            shared: self.shared.clone(),
            generations: self.generations.clone(),
            doorbell: self.doorbell_tx.clone(),
        }
    }

    /// 有新请求时收到信号
    pub fn doorbell(&self) -> &Receiver<()> {
        &self.doorbell
    }

    pub fn is_pending(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// 距下一个节拍可用还有多久
    pub fn time_until_ready(&self, now: Instant) -> Duration {
        self.pacer.time_until_ready(now)
    }

    /// 取出本节拍的绘制许可
    ///
    /// 没有待绘制请求、节拍间隔未到或已销毁时返回 `None`。
    pub fn take_tick(&mut self, now: Instant) -> Option<FrameTicket> {
        if self.shared.disposed.load(Ordering::Acquire) || !self.pacer.is_ready(now) {
            return None;
        }

        // 先清门铃再清标记：之后到达的请求一定会重新敲门铃
        while self.doorbell.try_recv().is_ok() {}
        if !self.shared.pending.swap(false, Ordering::AcqRel) {
            return None;
        }

        self.pacer.mark(now);
        self.ticks += 1;
        let generation = Generation::new(self.shared.target.load(Ordering::Acquire));
        trace!(tick = self.ticks, %generation, "Redraw tick");
        Some(FrameTicket { generation })
    }

    /// 执行一个节拍：至多调用一次 `draw`
    pub fn run_tick(&mut self, handler: &mut ContextHandler) -> Result<Option<DrawOutcome>> {
        self.run_tick_at(handler, Instant::now())
    }

    pub fn run_tick_at(
        &mut self,
        handler: &mut ContextHandler,
        now: Instant,
    ) -> Result<Option<DrawOutcome>> {
        match self.take_tick(now) {
            Some(ticket) => handler.draw_at(ticket.generation()).map(Some),
            None => Ok(None),
        }
    }

    /// 累计收到的请求数
    pub fn requests(&self) -> u64 {
        self.shared.requests.load(Ordering::Relaxed)
    }

    /// 已取出的节拍数
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// 停止接受请求，丢弃尚未执行的节拍
    pub fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::Release);
        self.shared.pending.store(false, Ordering::Release);
    }
}
