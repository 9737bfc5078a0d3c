//! 渲染线程
//!
//! 渲染线程独占 `ContextHandler`，所有 `ensure_canvas` / `draw` / `dispose`
//! 都在这里执行。宿主线程只通过无阻塞的意图通道（尺寸变化、后端切换、
//! 表面格式、销毁）和 `RedrawHandle` 与之通信，生命周期事件通过另一个通道回传。
//!
//! 每一轮循环：
//! 1. 处理积压的意图
//! 2. 没有上下文时按退避间隔重试 `ensure_context`
//! 3. 对最新尺寸调用 `ensure_canvas`，新建了表面就请求一次重绘
//! 4. 执行一个调度节拍
//! 5. 等待新意图、重绘门铃或下一个截止时间

use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use tracing::{debug, info, trace, warn};

use super::generation::Generation;
use super::handler::{ContextHandler, DrawOutcome};
use super::metrics::FrameStats;
use super::scheduler::{RedrawHandle, RedrawScheduler};
use crate::core::config::SchedulerConfig;
use crate::core::error::{DistCanvasError, GraphicsError, Result};
use crate::gfx::target::SurfaceFormat;
use crate::gfx::GraphicsApi;

/// 空闲时的最长等待
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// 宿主发给渲染线程的意图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderIntent {
    /// 窗口可绘制尺寸变化（像素）
    Resize { width: i32, height: i32 },
    SwitchBackend(GraphicsApi),
    SetSurfaceFormat(SurfaceFormat),
    Dispose,
}

/// 渲染线程回传的生命周期事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    BackendSelected(GraphicsApi),
    /// 所有候选后端都失败，稍后重试
    ContextFailed(String),
    TargetRecreated {
        width: u32,
        height: u32,
        generation: Generation,
    },
    /// 表面创建失败或交换链失效，稍后重建
    SurfaceFailed(String),
    /// 设备丢失，上下文将被重建
    ContextLost(String),
    PaintFailed(String),
    PresentFailed(String),
    Disposed,
}

/// 渲染线程句柄
///
/// 丢弃句柄等同于 `shutdown()`。
pub struct RenderThread {
    intents: Sender<RenderIntent>,
    events: Receiver<RenderEvent>,
    redraw: RedrawHandle,
    join: Option<JoinHandle<()>>,
}

impl RenderThread {
    /// 启动渲染线程并移交处理器
    pub fn spawn(handler: ContextHandler, config: &SchedulerConfig) -> Result<Self> {
        let scheduler = RedrawScheduler::new(handler.generations(), config.frame_interval());
        let redraw = scheduler.handle();
        let (intent_tx, intent_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();

        let worker = Worker {
            handler,
            scheduler,
            redraw: redraw.clone(),
            intents: intent_rx,
            events: event_tx,
            retry_interval: config.context_retry(),
            next_context_retry: None,
            next_surface_retry: None,
            size: None,
            stats: FrameStats::new(),
        };

        let join = thread::Builder::new()
            .name("dist-canvas-render".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            intents: intent_tx,
            events: event_rx,
            redraw,
            join: Some(join),
        })
    }

    /// 可交给任意线程的重绘句柄
    pub fn redraw_handle(&self) -> RedrawHandle {
        self.redraw.clone()
    }

    pub fn request_redraw(&self) -> bool {
        self.redraw.request_redraw()
    }

    pub fn resize(&self, width: i32, height: i32) {
        self.send(RenderIntent::Resize { width, height });
    }

    pub fn switch_backend(&self, api: GraphicsApi) {
        self.send(RenderIntent::SwitchBackend(api));
    }

    pub fn set_surface_format(&self, format: SurfaceFormat) {
        self.send(RenderIntent::SetSurfaceFormat(format));
    }

    /// 生命周期事件
    pub fn events(&self) -> &Receiver<RenderEvent> {
        &self.events
    }

    /// 请求销毁但不等待线程退出
    ///
    /// 在窗口事件循环线程上使用：渲染线程可能正同步等待该线程处理窗口调用。
    /// 收到 `RenderEvent::Disposed` 之后再调用 `shutdown()`。
    pub fn request_shutdown(&self) {
        self.send(RenderIntent::Dispose);
    }

    /// 销毁处理器并等待线程退出
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn send(&self, intent: RenderIntent) {
        if self.intents.send(intent).is_err() {
            debug!(?intent, "Render thread already stopped");
        }
    }

    fn stop(&mut self) -> Result<()> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        self.send(RenderIntent::Dispose);
        join.join()
            .map_err(|_| DistCanvasError::Initialization("render thread panicked".to_string()))
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
    }
}

struct Worker {
    handler: ContextHandler,
    scheduler: RedrawScheduler,
    redraw: RedrawHandle,
    intents: Receiver<RenderIntent>,
    events: Sender<RenderEvent>,
    retry_interval: Duration,
    next_context_retry: Option<Instant>,
    next_surface_retry: Option<Instant>,
    size: Option<(i32, i32)>,
    stats: FrameStats,
}

impl Worker {
    fn run(mut self) {
        info!("Render thread started");
        let intents = self.intents.clone();
        let doorbell = self.scheduler.doorbell().clone();

        'render: loop {
            while let Ok(intent) = intents.try_recv() {
                if self.apply(intent).is_break() {
                    break 'render;
                }
            }

            let now = Instant::now();
            if !self.handler.has_context() {
                self.ensure_context(now);
            }
            if self.handler.has_context() {
                self.sync_canvas(now);
            }
            self.tick();

            let timeout = self.wait_timeout(Instant::now());
            select! {
                recv(intents) -> msg => match msg {
                    Ok(intent) => {
                        if self.apply(intent).is_break() {
                            break 'render;
                        }
                    }
                    Err(_) => {
                        debug!("Intent channel closed");
                        break 'render;
                    }
                },
                recv(doorbell) -> _ => {}
                default(timeout) => {}
            }
        }

        self.scheduler.dispose();
        self.handler.dispose();
        self.emit(RenderEvent::Disposed);
        info!(
            frames = self.stats.total_frames(),
            skipped = self.stats.skipped_frames(),
            "Render thread stopped"
        );
    }

    fn apply(&mut self, intent: RenderIntent) -> ControlFlow<()> {
        trace!(?intent, "Render intent");
        match intent {
            RenderIntent::Resize { width, height } => {
                self.size = Some((width, height));
                self.next_surface_retry = None;
            }
            RenderIntent::SwitchBackend(api) => self.switch_backend(api),
            RenderIntent::SetSurfaceFormat(format) => {
                self.handler.set_surface_format(format);
                self.next_surface_retry = None;
            }
            RenderIntent::Dispose => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn ensure_context(&mut self, now: Instant) {
        if self.next_context_retry.is_some_and(|at| now < at) {
            return;
        }

        match self.handler.ensure_context() {
            Ok(api) => {
                self.next_context_retry = None;
                self.next_surface_retry = None;
                self.emit(RenderEvent::BackendSelected(api));
            }
            Err(e) => {
                warn!(retry_ms = self.retry_interval.as_millis() as u64, "{}", e);
                self.next_context_retry = Some(now + self.retry_interval);
                self.emit(RenderEvent::ContextFailed(e.to_string()));
            }
        }
    }

    fn sync_canvas(&mut self, now: Instant) {
        let Some((width, height)) = self.size else {
            return;
        };
        if self.next_surface_retry.is_some_and(|at| now < at) {
            return;
        }

        match self.handler.ensure_canvas(width, height) {
            Ok(true) => {
                self.next_surface_retry = None;
                self.target_recreated();
            }
            Ok(false) => {}
            Err(e) => {
                self.next_surface_retry = Some(now + self.retry_interval);
                self.emit(RenderEvent::SurfaceFailed(e.to_string()));
            }
        }
    }

    fn switch_backend(&mut self, api: GraphicsApi) {
        match self.handler.switch_backend(api) {
            Ok(selected) => {
                self.next_context_retry = None;
                self.emit(RenderEvent::BackendSelected(selected));
                if self.handler.render_target().is_some() {
                    self.target_recreated();
                }
            }
            Err(e) => {
                self.emit(RenderEvent::ContextFailed(e.to_string()));
                match self.handler.active_api() {
                    // 切换失败，原后端仍在（或已恢复）
                    Some(current) => {
                        self.emit(RenderEvent::BackendSelected(current));
                        if self.handler.render_target().is_some() {
                            self.target_recreated();
                        } else {
                            self.next_surface_retry = None;
                        }
                    }
                    None => self.next_context_retry = Some(Instant::now() + self.retry_interval),
                }
            }
        }
    }

    /// 新表面建立后总要补一帧
    fn target_recreated(&mut self) {
        if let Some(target) = self.handler.render_target() {
            let event = RenderEvent::TargetRecreated {
                width: target.width,
                height: target.height,
                generation: self.handler.generation(),
            };
            self.emit(event);
        }
        self.redraw.request_redraw();
    }

    fn tick(&mut self) {
        let now = Instant::now();
        match self.scheduler.run_tick_at(&mut self.handler, now) {
            Ok(None) => {}
            Ok(Some(DrawOutcome::Drawn { .. })) => {
                if let Some(fps) = self.stats.record_frame(now) {
                    debug!(fps, frame_time_ms = self.stats.frame_time_ms(), "Frame stats");
                }
            }
            Ok(Some(DrawOutcome::Skipped(reason))) => {
                trace!(?reason, "Redraw skipped");
                self.stats.record_skip();
            }
            Err(e) => self.draw_failed(e),
        }
    }

    fn draw_failed(&mut self, err: DistCanvasError) {
        warn!("{}", err);
        let graphics = match &err {
            DistCanvasError::Graphics(g) => Some(g),
            // 绘制与呈现同时失败
            DistCanvasError::Paint(e) => e.downcast_ref::<GraphicsError>(),
            _ => None,
        };
        let recovery = match graphics {
            Some(g) if g.is_context_loss() => {
                // 立即重建，不等退避
                self.next_context_retry = None;
                self.next_surface_retry = None;
                Some(RenderEvent::ContextLost(g.to_string()))
            }
            Some(g @ GraphicsError::SurfaceLost(_)) => {
                self.next_surface_retry = None;
                Some(RenderEvent::SurfaceFailed(g.to_string()))
            }
            Some(g) => Some(RenderEvent::PresentFailed(g.to_string())),
            None if matches!(err, DistCanvasError::Paint(_)) => None,
            None => Some(RenderEvent::PresentFailed(err.to_string())),
        };

        if matches!(err, DistCanvasError::Paint(_)) {
            self.emit(RenderEvent::PaintFailed(err.to_string()));
        }
        if let Some(event) = recovery {
            self.emit(event);
        }
    }

    fn wait_timeout(&self, now: Instant) -> Duration {
        let mut timeout = IDLE_WAIT;
        if self.scheduler.is_pending() {
            timeout = timeout.min(self.scheduler.time_until_ready(now));
        }
        for deadline in [self.next_context_retry, self.next_surface_retry].into_iter().flatten() {
            timeout = timeout.min(deadline.saturating_duration_since(now));
        }
        timeout
    }

    fn emit(&self, event: RenderEvent) {
        // 宿主不读事件时直接丢弃
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::canvas::{Canvas, Color, Rect};
    use crate::gfx::target::HeadlessFramebuffer;
    use crate::gfx::{FixedBackend, PlatformContextFactory};
    use crate::renderer::handler::FrameInfo;
    use crate::renderer::testing::{Entry, Journal, MockFactory, Script};

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            frame_interval_ms: 1,
            context_retry_ms: 10,
        }
    }

    fn wait_for(thread: &RenderThread, pred: impl Fn(&RenderEvent) -> bool) -> RenderEvent {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = thread
                .events()
                .recv_timeout(remaining)
                .expect("timed out waiting for render event");
            if pred(&event) {
                return event;
            }
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn red_painter(canvas: &mut dyn Canvas, _frame: &FrameInfo) -> anyhow::Result<()> {
        canvas.clear(Color::rgb(1.0, 0.0, 0.0));
        canvas.fill_rect(Rect::new(0.0, 0.0, 8.0, 8.0), Color::rgb(0.0, 1.0, 0.0));
        Ok(())
    }

    #[test]
    fn test_software_frames_reach_the_sink() {
        let framebuffer = HeadlessFramebuffer::new(3, 64, 48);
        let factory = PlatformContextFactory::headless(Arc::new(framebuffer));
        let sink = factory.frame_sink();
        let handler = ContextHandler::new(
            Arc::new(FixedBackend::software_only()),
            Box::new(factory),
            red_painter,
        );

        let thread = RenderThread::spawn(handler, &fast_config()).unwrap();
        thread.resize(64, 48);

        assert_eq!(
            wait_for(&thread, |e| matches!(e, RenderEvent::BackendSelected(_))),
            RenderEvent::BackendSelected(GraphicsApi::Software)
        );
        let recreated = wait_for(&thread, |e| matches!(e, RenderEvent::TargetRecreated { .. }));
        assert!(matches!(
            recreated,
            RenderEvent::TargetRecreated { width: 64, height: 48, .. }
        ));

        wait_until(|| sink.presented() >= 1);
        let frame = sink.latest().unwrap();
        assert_eq!(frame.framebuffer_id, 3);
        assert_eq!(frame.pixels.pixel(32, 32), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixels.pixel(2, 2), Some([0, 255, 0, 255]));

        let presented = sink.presented();
        assert!(thread.request_redraw());
        wait_until(|| sink.presented() > presented);

        thread.shutdown().unwrap();
    }

    #[test]
    fn test_resize_and_switch_backend_through_intents() {
        let journal = Journal::default();
        let factory = MockFactory::new(
            journal.clone(),
            Script::default(),
            HeadlessFramebuffer::new(1, 800, 600),
        );
        let handler = ContextHandler::new(
            Arc::new(FixedBackend::new(
                vec![GraphicsApi::Vulkan, GraphicsApi::Software],
                vec![GraphicsApi::Vulkan, GraphicsApi::Software],
            )),
            Box::new(factory),
            red_painter,
        );

        let thread = RenderThread::spawn(handler, &fast_config()).unwrap();
        thread.resize(800, 600);
        wait_for(&thread, |e| *e == RenderEvent::BackendSelected(GraphicsApi::Vulkan));
        wait_for(&thread, |e| matches!(e, RenderEvent::TargetRecreated { width: 800, .. }));

        thread.resize(1024, 768);
        wait_for(&thread, |e| matches!(e, RenderEvent::TargetRecreated { width: 1024, .. }));

        thread.switch_backend(GraphicsApi::Software);
        wait_for(&thread, |e| *e == RenderEvent::BackendSelected(GraphicsApi::Software));
        wait_until(|| {
            journal.count(|e| *e == Entry::Presented { width: 1024, height: 768, ops: 2 }) >= 2
        });

        thread.shutdown().unwrap();
        let entries = journal.entries();
        assert_eq!(entries.last(), Some(&Entry::ContextReleased(GraphicsApi::Software)));
        assert_eq!(journal.count(|e| matches!(e, Entry::ContextReleased(_))), 2);
    }

    #[test]
    fn test_context_loss_is_recovered() {
        let journal = Journal::default();
        let script = Script::default();
        let factory = MockFactory::new(
            journal.clone(),
            script.clone(),
            HeadlessFramebuffer::new(1, 320, 240),
        );
        let handler = ContextHandler::new(
            Arc::new(FixedBackend::software_only()),
            Box::new(factory),
            red_painter,
        );
        script.fail_present(GraphicsError::ContextLost("device removed".into()));

        let thread = RenderThread::spawn(handler, &fast_config()).unwrap();
        thread.resize(320, 240);

        wait_for(&thread, |e| matches!(e, RenderEvent::ContextLost(_)));
        wait_until(|| journal.presents() >= 1);
        assert_eq!(journal.count(|e| matches!(e, Entry::ContextCreated(_))), 2);

        drop(thread);
        assert_eq!(journal.count(|e| matches!(e, Entry::ContextReleased(_))), 2);
    }

    #[test]
    fn test_shutdown_reports_disposed() {
        let handler = ContextHandler::new(
            Arc::new(FixedBackend::software_only()),
            Box::new(PlatformContextFactory::headless(Arc::new(
                HeadlessFramebuffer::new(1, 16, 16),
            ))),
            red_painter,
        );
        let thread = RenderThread::spawn(handler, &fast_config()).unwrap();
        let events = thread.events().clone();
        let redraw = thread.redraw_handle();

        thread.shutdown().unwrap();
        assert!(events.iter().any(|e| e == RenderEvent::Disposed));
        assert!(!redraw.request_redraw());
    }

    #[test]
    fn test_failed_switch_keeps_rendering_on_current_backend() {
        let journal = Journal::default();
        let factory = MockFactory::new(
            journal.clone(),
            Script::default(),
            HeadlessFramebuffer::new(1, 200, 100),
        );
        let handler = ContextHandler::new(
            Arc::new(FixedBackend::new(
                vec![GraphicsApi::Vulkan, GraphicsApi::Software],
                vec![GraphicsApi::Vulkan, GraphicsApi::Software],
            )),
            Box::new(factory),
            red_painter,
        );

        let thread = RenderThread::spawn(handler, &fast_config()).unwrap();
        thread.resize(200, 100);
        wait_for(&thread, |e| matches!(e, RenderEvent::TargetRecreated { .. }));

        thread.switch_backend(GraphicsApi::Metal);
        wait_for(&thread, |e| matches!(e, RenderEvent::ContextFailed(_)));
        assert_eq!(
            wait_for(&thread, |e| matches!(e, RenderEvent::BackendSelected(_))),
            RenderEvent::BackendSelected(GraphicsApi::Vulkan)
        );

        let presents = journal.presents();
        assert!(thread.request_redraw());
        wait_until(|| journal.presents() > presents);
        assert_eq!(journal.count(|e| matches!(e, Entry::ContextCreated(_))), 1);

        thread.shutdown().unwrap();
    }

    #[test]
    fn test_request_shutdown_does_not_block() {
        let handler = ContextHandler::new(
            Arc::new(FixedBackend::software_only()),
            Box::new(PlatformContextFactory::headless(Arc::new(
                HeadlessFramebuffer::new(1, 16, 16),
            ))),
            red_painter,
        );
        let thread = RenderThread::spawn(handler, &fast_config()).unwrap();
        thread.resize(16, 16);

        thread.request_shutdown();
        assert_eq!(wait_for(&thread, |e| *e == RenderEvent::Disposed), RenderEvent::Disposed);
        assert!(!thread.request_redraw());
        thread.shutdown().unwrap();
    }
}
