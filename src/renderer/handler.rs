//! 渲染上下文生命周期管理
//!
//! `ContextHandler` 独占持有一组（GPU 上下文，渲染目标，绘制表面），
//! 并让它们与窗口状态保持一致：
//!
//! - `init_context` / `ensure_context`：按后端顺序创建或复用上下文
//! - `ensure_canvas`：窗口尺寸或表面格式变化时重建渲染目标与表面
//! - `draw`：调用绘制回调，然后刷新并呈现
//! - `dispose`：按获取的逆序释放全部资源
//!
//! 所有方法都只能在渲染线程上调用；其他线程通过 `RedrawHandle`
//! 和 `RenderThread` 的意图通道与之通信。

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::generation::{Generation, GenerationCounter};
use crate::canvas::{Canvas, Surface};
use crate::core::error::{DistCanvasError, GraphicsError, Result};
use crate::gfx::target::{RenderTarget, SurfaceFormat};
use crate::gfx::{ContextFactory, GpuContext, GraphicsApi, GraphicsBackend};

/// 传给绘制回调的帧信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// 当前表面的代数
    pub generation: Generation,
    pub width: u32,
    pub height: u32,
    pub api: GraphicsApi,
    /// 已绘制的帧序号（从 0 开始）
    pub frame_index: u64,
}

/// 绘制回调
///
/// 画布只在回调期间借出，不能被保留到下一帧。
pub trait Painter: Send {
    fn paint(&mut self, canvas: &mut dyn Canvas, frame: &FrameInfo) -> anyhow::Result<()>;
}

impl<F> Painter for F
where
    F: FnMut(&mut dyn Canvas, &FrameInfo) -> anyhow::Result<()> + Send,
{
    fn paint(&mut self, canvas: &mut dyn Canvas, frame: &FrameInfo) -> anyhow::Result<()> {
        self(canvas, frame)
    }
}

/// 跳过绘制的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 处理器已销毁
    Disposed,
    /// 还没有可绘制的表面（无上下文、零尺寸或表面创建失败）
    NoSurface,
    /// 请求的代数已被新的渲染目标取代
    Stale,
}

/// `draw` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn { generation: Generation },
    Skipped(SkipReason),
}

impl DrawOutcome {
    pub fn is_drawn(&self) -> bool {
        matches!(self, DrawOutcome::Drawn { .. })
    }
}

/// 渲染目标 + 外部 2D 库的表面
///
/// 一帧内所有绘制命令都经由它发出。渲染目标重建时整体丢弃。
pub struct DrawSurface {
    surface: Box<dyn Surface>,
    target: RenderTarget,
    format: SurfaceFormat,
    generation: Generation,
}

impl DrawSurface {
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// 渲染上下文处理器
pub struct ContextHandler {
    backend: Arc<dyn GraphicsBackend>,
    factory: Box<dyn ContextFactory>,
    painter: Box<dyn Painter>,
    forced: Option<GraphicsApi>,
    format: SurfaceFormat,
    // 释放顺序：表面先于上下文
    draw_surface: Option<DrawSurface>,
    context: Option<Box<dyn GpuContext>>,
    /// 最近一次 `ensure_canvas` 请求的尺寸（已钳制）
    size: Option<(u32, u32)>,
    generations: GenerationCounter,
    frame_index: u64,
    disposed: bool,
}

impl ContextHandler {
    pub fn new(
        backend: Arc<dyn GraphicsBackend>,
        factory: Box<dyn ContextFactory>,
        painter: impl Painter + 'static,
    ) -> Self {
        Self {
            backend,
            factory,
            painter: Box::new(painter),
            forced: None,
            format: SurfaceFormat::default(),
            draw_surface: None,
            context: None,
            size: None,
            generations: GenerationCounter::new(),
            frame_index: 0,
            disposed: false,
        }
    }

    /// 只尝试指定的图形 API
    pub fn with_forced_api(mut self, api: Option<GraphicsApi>) -> Self {
        self.forced = api;
        self
    }

    pub fn with_surface_format(mut self, format: SurfaceFormat) -> Self {
        self.format = format;
        self
    }

    /// 获取或复用 GPU 上下文
    ///
    /// 只有在所有候选后端都失败时才返回 `false`。
    pub fn init_context(&mut self) -> bool {
        match self.ensure_context() {
            Ok(_) => true,
            Err(e) => {
                warn!("No graphics backend could be initialized: {}", e);
                false
            }
        }
    }

    /// `init_context` 的显式错误形式
    ///
    /// 返回选中的图形 API，全部失败时返回最后一个错误。
    pub fn ensure_context(&mut self) -> Result<GraphicsApi> {
        if self.disposed {
            return Err(DistCanvasError::Initialization(
                "context handler has been disposed".to_string(),
            ));
        }
        if let Some(context) = &self.context {
            return Ok(context.api());
        }

        let mut last_error = GraphicsError::NoContext;
        for api in self.backend.selection_order(self.forced) {
            if !self.backend.is_available(api) {
                let err = GraphicsError::BackendUnavailable(api);
                debug!(api = %api, "{}", err);
                last_error = err;
                continue;
            }

            match self.factory.create_context(api) {
                Ok(context) => {
                    let generation = self.generations.bump();
                    info!(api = %api, %generation, "Graphics context created");
                    self.context = Some(context);
                    return Ok(api);
                }
                Err(err) => {
                    warn!(api = %api, "{}", err);
                    last_error = err;
                }
            }
        }

        Err(last_error.into())
    }

    /// 确保绘制表面与给定尺寸一致
    ///
    /// 负数尺寸钳制为 0；任一维为 0 时不建立渲染目标。
    /// 返回是否新建了绘制表面。
    pub fn ensure_canvas(&mut self, width: i32, height: i32) -> Result<bool> {
        let width = width.max(0) as u32;
        let height = height.max(0) as u32;
        self.ensure_canvas_size(width, height)
    }

    fn ensure_canvas_size(&mut self, width: u32, height: u32) -> Result<bool> {
        if self.size == Some((width, height)) && self.surface_current(width, height) {
            return Ok(false);
        }

        if let Some(old) = self.draw_surface.take() {
            debug!(generation = %old.generation, "Releasing draw surface");
        }
        self.size = Some((width, height));

        let context = self.context.as_mut().ok_or(GraphicsError::NoContext)?;

        if width == 0 || height == 0 {
            debug!(width, height, "Zero-sized canvas, no render target");
            return Ok(false);
        }

        let binding = context.framebuffer();
        let target = RenderTarget::new(width, height, self.format, &binding);

        let Some(surface) = context.make_surface(&target) else {
            warn!(api = %context.api(), width, height, "Surface creation failed");
            return Err(GraphicsError::SurfaceCreation(format!(
                "{}x{} {:?}/{:?} x{} on {}",
                width,
                height,
                target.color_format,
                target.color_space,
                target.sample_count,
                context.api()
            ))
            .into());
        };

        let generation = self.generations.bump();
        info!(
            width,
            height,
            samples = target.sample_count,
            framebuffer = target.framebuffer_id,
            %generation,
            "Render target created"
        );
        self.draw_surface = Some(DrawSurface {
            surface,
            target,
            format: self.format,
            generation,
        });
        Ok(true)
    }

    fn surface_current(&self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return self.context.is_some();
        }
        self.draw_surface
            .as_ref()
            .is_some_and(|ds| ds.format == self.format && ds.target.matches(width, height, &self.format))
    }

    /// 绘制一帧
    pub fn draw(&mut self) -> Result<DrawOutcome> {
        self.draw_inner(None)
    }

    /// 绘制为指定代数请求的一帧；代数已被取代时丢弃
    pub fn draw_at(&mut self, requested: Generation) -> Result<DrawOutcome> {
        self.draw_inner(Some(requested))
    }

    fn draw_inner(&mut self, requested: Option<Generation>) -> Result<DrawOutcome> {
        if self.disposed {
            return Ok(DrawOutcome::Skipped(SkipReason::Disposed));
        }
        let Some(api) = self.context.as_ref().map(|c| c.api()) else {
            return Ok(DrawOutcome::Skipped(SkipReason::NoSurface));
        };
        let Some(ds) = self.draw_surface.as_mut() else {
            return Ok(DrawOutcome::Skipped(SkipReason::NoSurface));
        };

        if let Some(requested) = requested {
            if requested < ds.generation {
                debug!(%requested, current = %ds.generation, "Dropping stale redraw");
                return Ok(DrawOutcome::Skipped(SkipReason::Stale));
            }
        }

        let frame = FrameInfo {
            generation: ds.generation,
            width: ds.target.width,
            height: ds.target.height,
            api,
            frame_index: self.frame_index,
        };
        self.frame_index += 1;

        let painted = self.painter.paint(ds.surface.canvas(), &frame);
        // 绘制回调失败也要刷新，保持命令状态一致
        let presented = ds.surface.flush_and_present();

        if let Err(err) = presented {
            if err.is_context_loss() {
                warn!(api = %api, "{}", err);
                self.release_context();
            } else if matches!(err, GraphicsError::SurfaceLost(_)) {
                warn!(generation = %frame.generation, "{}", err);
                self.draw_surface = None;
            }
            // 两者都失败时绘制错误在外层，呈现错误作为上下文保留
            return Err(match painted {
                Err(paint_err) => DistCanvasError::Paint(paint_err.context(err)),
                Ok(()) => err.into(),
            });
        }

        painted.map_err(DistCanvasError::Paint)?;
        Ok(DrawOutcome::Drawn {
            generation: frame.generation,
        })
    }

    /// 切换图形 API：完整释放后重建
    ///
    /// 已有的画布尺寸会在新上下文上立即重建。目标 API 不可用或创建失败时
    /// 恢复原先的选择并重建上下文，返回切换失败的错误。
    pub fn switch_backend(&mut self, api: GraphicsApi) -> Result<GraphicsApi> {
        if self.disposed {
            return Err(DistCanvasError::Initialization(
                "context handler has been disposed".to_string(),
            ));
        }
        if !self.backend.is_available(api) {
            warn!(api = %api, current = ?self.active_api(), "Backend unavailable, keeping current backend");
            return Err(GraphicsError::BackendUnavailable(api).into());
        }

        info!(from = ?self.active_api(), to = %api, "Switching graphics backend");
        let previous = self.forced.replace(api);
        self.release_context();

        match self.ensure_context() {
            Ok(selected) => {
                self.rebuild_canvas()?;
                Ok(selected)
            }
            Err(err) => {
                warn!(api = %api, "Backend switch failed, restoring previous selection: {}", err);
                self.forced = previous;
                match self.ensure_context() {
                    Ok(restored) => {
                        info!(api = %restored, "Previous backend restored");
                        if let Err(e) = self.rebuild_canvas() {
                            warn!("{}", e);
                        }
                    }
                    Err(e) => warn!("No backend could be restored: {}", e),
                }
                Err(err)
            }
        }
    }

    fn rebuild_canvas(&mut self) -> Result<()> {
        if let Some((width, height)) = self.size {
            self.ensure_canvas_size(width, height)?;
        }
        Ok(())
    }

    /// 更改表面格式，下一次 `ensure_canvas` 时生效
    pub fn set_surface_format(&mut self, format: SurfaceFormat) {
        if self.format != format {
            debug!(?format, "Surface format changed");
            self.format = format;
        }
    }

    /// 上下文丢失：释放表面与上下文但不销毁处理器
    ///
    /// 画布尺寸保留，重新 `init_context` 后 `ensure_canvas` 会重建渲染目标。
    pub fn release_context(&mut self) {
        if let Some(old) = self.draw_surface.take() {
            debug!(generation = %old.generation, "Releasing draw surface");
        }
        if let Some(context) = self.context.take() {
            info!(api = %context.api(), "Releasing graphics context");
        }
    }

    /// 按获取的逆序释放表面、渲染目标与上下文；可重复调用
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.release_context();
        self.size = None;
        info!(generation = %self.generations.current(), "Context handler disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn active_api(&self) -> Option<GraphicsApi> {
        self.context.as_ref().map(|c| c.api())
    }

    pub fn render_target(&self) -> Option<&RenderTarget> {
        self.draw_surface.as_ref().map(|ds| &ds.target)
    }

    pub fn draw_surface(&self) -> Option<&DrawSurface> {
        self.draw_surface.as_ref()
    }

    pub fn surface_format(&self) -> SurfaceFormat {
        self.format
    }

    pub fn generation(&self) -> Generation {
        self.generations.current()
    }

    /// 与调度器共享的代数计数器
    pub fn generations(&self) -> GenerationCounter {
        self.generations.clone()
    }
}

impl Drop for ContextHandler {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::canvas::{Color, Rect};
    use crate::gfx::target::{ColorFormat, ColorSpace, HeadlessFramebuffer};
    use crate::gfx::FixedBackend;
    use crate::renderer::testing::{Entry, Journal, MockFactory, Script};

    struct Harness {
        journal: Journal,
        script: Script,
        frames: Arc<Mutex<Vec<FrameInfo>>>,
        fail_paint: Arc<AtomicBool>,
    }

    fn handler_with(available: Vec<GraphicsApi>, order: Vec<GraphicsApi>) -> (ContextHandler, Harness) {
        let journal = Journal::default();
        let script = Script::default();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let fail_paint = Arc::new(AtomicBool::new(false));

        let factory = MockFactory::new(
            journal.clone(),
            script.clone(),
            HeadlessFramebuffer::new(7, 800, 600),
        );
        let painted = frames.clone();
        let fail = fail_paint.clone();
        let painter = move |canvas: &mut dyn Canvas, frame: &FrameInfo| -> anyhow::Result<()> {
            canvas.clear(Color::BLACK);
            canvas.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
            painted.lock().unwrap().push(*frame);
            if fail.load(Ordering::SeqCst) {
                anyhow::bail!("painter exploded");
            }
            Ok(())
        };

        let handler = ContextHandler::new(
            Arc::new(FixedBackend::new(available, order)),
            Box::new(factory),
            painter,
        );
        (
            handler,
            Harness {
                journal,
                script,
                frames,
                fail_paint,
            },
        )
    }

    fn software_handler() -> (ContextHandler, Harness) {
        handler_with(vec![GraphicsApi::Software], vec![GraphicsApi::Software])
    }

    #[test]
    fn test_unchanged_size_is_noop() {
        let (mut handler, h) = software_handler();
        assert!(handler.init_context());
        assert!(handler.ensure_canvas(800, 600).unwrap());
        let generation = handler.generation();

        assert!(!handler.ensure_canvas(800, 600).unwrap());
        assert!(!handler.ensure_canvas(800, 600).unwrap());
        assert_eq!(handler.generation(), generation);
        assert_eq!(h.journal.count(|e| matches!(e, Entry::SurfaceCreated { .. })), 1);
    }

    #[test]
    fn test_resize_releases_old_surface_first() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();
        let before = handler.generation();
        h.journal.clear();

        assert!(handler.ensure_canvas(1024, 768).unwrap());
        assert!(handler.generation() > before);
        assert_eq!(
            h.journal.entries(),
            vec![
                Entry::SurfaceReleased { width: 800, height: 600 },
                Entry::SurfaceCreated { width: 1024, height: 768 },
            ]
        );
        let target = handler.render_target().unwrap();
        assert_eq!((target.width, target.height), (1024, 768));
        assert_eq!(target.framebuffer_id, 7);
    }

    #[test]
    fn test_dispose_twice_releases_once_in_reverse_order() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();
        h.journal.clear();

        handler.dispose();
        handler.dispose();
        assert!(handler.is_disposed());
        assert_eq!(
            h.journal.entries(),
            vec![
                Entry::SurfaceReleased { width: 800, height: 600 },
                Entry::ContextReleased(GraphicsApi::Software),
            ]
        );

        drop(handler);
        assert_eq!(h.journal.entries().len(), 2);
    }

    #[test]
    fn test_draw_after_dispose_is_noop() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();
        handler.dispose();

        assert_eq!(
            handler.draw().unwrap(),
            DrawOutcome::Skipped(SkipReason::Disposed)
        );
        assert_eq!(h.journal.presents(), 0);
        assert!(h.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_size_then_full_size() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        let start = handler.generation();

        assert!(!handler.ensure_canvas(0, 0).unwrap());
        assert!(handler.render_target().is_none());
        assert_eq!(
            handler.draw().unwrap(),
            DrawOutcome::Skipped(SkipReason::NoSurface)
        );
        assert_eq!(handler.generation(), start);

        assert!(handler.ensure_canvas(800, 600).unwrap());
        assert_eq!(handler.generation(), start.next());
        let target = handler.render_target().unwrap();
        assert_eq!((target.width, target.height), (800, 600));
        assert_eq!(h.journal.count(|e| matches!(e, Entry::SurfaceCreated { .. })), 1);
    }

    #[test]
    fn test_negative_size_clamps_to_zero() {
        let (mut handler, _h) = software_handler();
        handler.init_context();
        assert!(!handler.ensure_canvas(-5, 10).unwrap());
        assert!(handler.render_target().is_none());
    }

    #[test]
    fn test_falls_back_when_preferred_backend_unavailable() {
        let (mut handler, h) = handler_with(
            vec![GraphicsApi::OpenGl, GraphicsApi::Software],
            vec![GraphicsApi::Metal, GraphicsApi::OpenGl],
        );
        assert!(handler.init_context());
        assert_eq!(handler.active_api(), Some(GraphicsApi::OpenGl));
        assert_eq!(h.journal.entries(), vec![Entry::ContextCreated(GraphicsApi::OpenGl)]);
    }

    #[test]
    fn test_context_creation_failure_tries_next_backend() {
        let (mut handler, h) = handler_with(
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
        );
        h.script.fail_context(GraphicsApi::Vulkan);
        assert_eq!(handler.ensure_context().unwrap(), GraphicsApi::Software);
    }

    #[test]
    fn test_all_backends_failing_returns_false() {
        let (mut handler, _h) = handler_with(vec![], vec![GraphicsApi::Vulkan, GraphicsApi::OpenGl]);
        assert!(!handler.init_context());
        assert!(!handler.has_context());

        let err = handler.ensure_context().unwrap_err();
        assert_eq!(
            err.as_graphics(),
            Some(&GraphicsError::BackendUnavailable(GraphicsApi::OpenGl))
        );
    }

    #[test]
    fn test_init_context_reuses_existing_context() {
        let (mut handler, h) = software_handler();
        assert!(handler.init_context());
        let generation = handler.generation();
        assert!(handler.init_context());
        assert_eq!(handler.generation(), generation);
        assert_eq!(h.journal.count(|e| matches!(e, Entry::ContextCreated(_))), 1);
    }

    #[test]
    fn test_forced_api_only_tries_that_api() {
        let (handler, _h) = handler_with(
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
        );
        let mut handler = handler.with_forced_api(Some(GraphicsApi::Metal));
        assert!(!handler.init_context());
    }

    #[test]
    fn test_ensure_canvas_requires_context() {
        let (mut handler, _h) = software_handler();
        let err = handler.ensure_canvas(800, 600).unwrap_err();
        assert_eq!(err.as_graphics(), Some(&GraphicsError::NoContext));

        // 上下文就绪后同样的尺寸会真正建立表面
        handler.init_context();
        assert!(handler.ensure_canvas(800, 600).unwrap());
    }

    #[test]
    fn test_surface_creation_failure_is_retried() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        h.script.fail_surfaces(1);
        let generation = handler.generation();

        let err = handler.ensure_canvas(800, 600).unwrap_err();
        assert!(matches!(
            err.as_graphics(),
            Some(GraphicsError::SurfaceCreation(_))
        ));
        assert_eq!(handler.generation(), generation);
        assert_eq!(
            handler.draw().unwrap(),
            DrawOutcome::Skipped(SkipReason::NoSurface)
        );

        assert!(handler.ensure_canvas(800, 600).unwrap());
        assert!(handler.draw().unwrap().is_drawn());
    }

    #[test]
    fn test_draw_paints_then_presents() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(320, 200).unwrap();

        let outcome = handler.draw().unwrap();
        assert_eq!(
            outcome,
            DrawOutcome::Drawn {
                generation: handler.generation()
            }
        );
        handler.draw().unwrap();

        assert_eq!(
            h.journal.count(|e| *e == Entry::Presented { width: 320, height: 200, ops: 2 }),
            2
        );
        let frames = h.frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].frame_index, 0);
        assert_eq!(frames[1].frame_index, 1);
        assert_eq!(frames[1].api, GraphicsApi::Software);
        assert_eq!((frames[1].width, frames[1].height), (320, 200));
    }

    #[test]
    fn test_paint_error_surfaces_after_present() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(64, 64).unwrap();
        h.fail_paint.store(true, Ordering::SeqCst);

        let err = handler.draw().unwrap_err();
        assert!(matches!(err, DistCanvasError::Paint(_)));
        assert_eq!(h.journal.presents(), 1);
        assert!(handler.render_target().is_some());
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();
        let old = handler.generation();
        handler.ensure_canvas(640, 480).unwrap();

        assert_eq!(
            handler.draw_at(old).unwrap(),
            DrawOutcome::Skipped(SkipReason::Stale)
        );
        assert_eq!(h.journal.presents(), 0);
        assert!(handler.draw_at(handler.generation()).unwrap().is_drawn());
    }

    #[test]
    fn test_context_loss_tears_down_and_recovers() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();
        h.journal.clear();
        h.script.fail_present(GraphicsError::ContextLost("device removed".into()));

        let err = handler.draw().unwrap_err();
        assert_eq!(
            err.as_graphics(),
            Some(&GraphicsError::ContextLost("device removed".into()))
        );
        assert!(!handler.has_context());
        assert!(!handler.is_disposed());
        assert_eq!(
            h.journal.entries(),
            vec![
                Entry::SurfaceReleased { width: 800, height: 600 },
                Entry::ContextReleased(GraphicsApi::Software),
            ]
        );

        assert!(handler.init_context());
        assert!(handler.ensure_canvas(800, 600).unwrap());
        assert!(handler.draw().unwrap().is_drawn());
    }

    #[test]
    fn test_surface_lost_recreates_target() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();
        let generation = handler.generation();
        h.script.fail_present(GraphicsError::SurfaceLost("outdated".into()));

        assert!(handler.draw().is_err());
        assert!(handler.has_context());
        assert!(handler.render_target().is_none());

        assert!(handler.ensure_canvas(800, 600).unwrap());
        assert!(handler.generation() > generation);
    }

    #[test]
    fn test_switch_backend_rebuilds_everything() {
        let (mut handler, h) = handler_with(
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
        );
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();
        h.journal.clear();

        assert_eq!(
            handler.switch_backend(GraphicsApi::Software).unwrap(),
            GraphicsApi::Software
        );
        assert_eq!(
            h.journal.entries(),
            vec![
                Entry::SurfaceReleased { width: 800, height: 600 },
                Entry::ContextReleased(GraphicsApi::Vulkan),
                Entry::ContextCreated(GraphicsApi::Software),
                Entry::SurfaceCreated { width: 800, height: 600 },
            ]
        );
        assert_eq!(handler.active_api(), Some(GraphicsApi::Software));
    }

    #[test]
    fn test_surface_format_change_forces_recreation() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();

        handler.set_surface_format(SurfaceFormat {
            color_format: ColorFormat::Rgba8888,
            color_space: ColorSpace::Linear,
            sample_count: 1,
        });
        assert!(handler.ensure_canvas(800, 600).unwrap());
        assert_eq!(h.journal.count(|e| matches!(e, Entry::SurfaceCreated { .. })), 2);
        assert_eq!(
            handler.render_target().unwrap().color_format,
            ColorFormat::Rgba8888
        );
    }

    #[test]
    fn test_switch_to_unavailable_backend_keeps_current() {
        let (mut handler, h) = handler_with(
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
        );
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();
        assert!(handler.draw().unwrap().is_drawn());
        let generation = handler.generation();
        h.journal.clear();

        let err = handler.switch_backend(GraphicsApi::Metal).unwrap_err();
        assert_eq!(
            err.as_graphics(),
            Some(&GraphicsError::BackendUnavailable(GraphicsApi::Metal))
        );
        assert_eq!(handler.active_api(), Some(GraphicsApi::Vulkan));
        assert!(handler.render_target().is_some());
        assert_eq!(handler.generation(), generation);
        assert!(h.journal.entries().is_empty());

        assert!(handler.init_context());
        assert!(handler.draw().unwrap().is_drawn());
    }

    #[test]
    fn test_failed_switch_restores_previous_backend() {
        let (mut handler, h) = handler_with(
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
            vec![GraphicsApi::Vulkan, GraphicsApi::Software],
        );
        handler.init_context();
        handler.ensure_canvas(800, 600).unwrap();
        h.journal.clear();
        h.script.fail_context(GraphicsApi::Software);

        let err = handler.switch_backend(GraphicsApi::Software).unwrap_err();
        assert!(matches!(
            err.as_graphics(),
            Some(GraphicsError::ContextCreation { api: GraphicsApi::Software, .. })
        ));
        assert_eq!(handler.active_api(), Some(GraphicsApi::Vulkan));
        assert_eq!(
            h.journal.entries(),
            vec![
                Entry::SurfaceReleased { width: 800, height: 600 },
                Entry::ContextReleased(GraphicsApi::Vulkan),
                Entry::ContextCreated(GraphicsApi::Vulkan),
                Entry::SurfaceCreated { width: 800, height: 600 },
            ]
        );
        assert!(handler.draw().unwrap().is_drawn());
    }

    #[test]
    fn test_paint_and_present_failures_are_both_reported() {
        let (mut handler, h) = software_handler();
        handler.init_context();
        handler.ensure_canvas(64, 64).unwrap();
        h.fail_paint.store(true, Ordering::SeqCst);
        h.script.fail_present(GraphicsError::ContextLost("device removed".into()));

        let err = handler.draw().unwrap_err();
        let DistCanvasError::Paint(inner) = &err else {
            panic!("expected a paint error, got {}", err);
        };
        assert_eq!(
            inner.downcast_ref::<GraphicsError>(),
            Some(&GraphicsError::ContextLost("device removed".into()))
        );
        let message = err.to_string();
        assert!(message.contains("painter exploded"));
        assert!(message.contains("device removed"));
        assert!(!handler.has_context());
    }
}
