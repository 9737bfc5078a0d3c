//! DistCanvas 演示程序
//!
//! 打开一个窗口，在渲染线程上绘制一个动画场景。图形 API 可以通过配置文件、
//! 环境变量或命令行参数选择。
//!
//! # 使用方法
//!
//! ```bash
//! # 自动探测后端
//! cargo run
//!
//! # 强制使用 Vulkan / OpenGL 后端
//! cargo run -- --backend vulkan
//! DIST_CANVAS_RENDER_API=opengl cargo run
//!
//! # 4x MSAA，指定窗口尺寸
//! cargo run -- --msaa 4 --width 1280 --height 720
//! ```
//!
//! 运行时按 `1`-`4` 切换到 OpenGL / Metal / Vulkan / Direct3D。目标后端不可用时保持当前后端。

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::TryRecvError;
use dist_canvas::canvas::{Canvas, Color, Rect};
use dist_canvas::core::config::RENDER_API_ENV;
use dist_canvas::core::{log, Config, DistCanvasError, Result};
use dist_canvas::gfx::{GraphicsApi, PlatformContextFactory, SystemBackend, WgpuOptions, WindowFramebuffer};
use dist_canvas::renderer::{ContextHandler, FrameInfo, Painter, RenderEvent, RenderThread};
use tracing::{debug, error, info, warn};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::Key;
use winit::window::{Window, WindowBuilder};

/// 主线程轮询渲染事件的间隔
const EVENT_POLL: Duration = Duration::from_millis(50);

fn main() {
    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");

    // 2. 环境变量与命令行覆盖（命令行优先）
    let env_override = config.apply_env();
    let arg_override = config.apply_args(std::env::args());

    // 3. 验证配置
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // 4. 初始化日志系统
    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    if let Err(e) = log::init_logger(config.logging.level, config.logging.file_output, log_file) {
        eprintln!("Failed to initialize logger: {}", e);
    }
    if let Err(e) = env_override {
        warn!("Ignoring {}: {}", RENDER_API_ENV, e);
    }
    if let Err(e) = arg_override {
        warn!("Ignoring --backend: {}", e);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "DistCanvas starting...");
    info!(
        backend = ?config.graphics.backend,
        width = config.window.width,
        height = config.window.height,
        msaa = config.graphics.msaa_samples,
        vsync = config.graphics.vsync,
        "Graphics configuration"
    );

    if let Err(e) = run(config) {
        error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|e| {
        DistCanvasError::Initialization(format!("Failed to create event loop: {}", e))
    })?;

    let window = WindowBuilder::new()
        .with_title(config.window.title.as_str())
        .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
        .with_resizable(config.window.resizable)
        .build(&event_loop)
        .map_err(|e| DistCanvasError::Initialization(format!("Failed to create window: {}", e)))?;
    let window = Arc::new(window);

    // 窗口句柄与尺寸只在主线程上读取
    let framebuffer = WindowFramebuffer::new(&window);
    let factory = PlatformContextFactory::for_window(
        window.clone(),
        framebuffer.clone(),
        WgpuOptions {
            vsync: config.graphics.vsync,
        },
    );
    if config.graphics.backend == Some(GraphicsApi::Software) {
        warn!("The demo window does not display software frames, only hardware backends will be tried");
    }
    let handler = ContextHandler::new(Arc::new(SystemBackend::new()), Box::new(factory), BouncingBars::new())
        .with_forced_api(config.graphics.backend)
        .with_surface_format(config.graphics.surface_format());

    let render = RenderThread::spawn(handler, &config.scheduler)?;
    let size = window.inner_size();
    render.resize(size.width as i32, size.height as i32);

    // 动画：按帧间隔持续请求重绘，渲染线程销毁后自动退出
    let redraw = render.redraw_handle();
    let interval = config.scheduler.frame_interval();
    thread::Builder::new()
        .name("dist-canvas-ticker".to_string())
        .spawn(move || {
            while redraw.request_redraw() {
                thread::sleep(interval);
            }
        })?;

    info!("Entering main loop...");
    let title = config.window.title.clone();
    let mut render = Some(render);

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::WaitUntil(Instant::now() + EVENT_POLL));

            match event {
                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => {
                    // 不在这里 join：渲染线程可能正等待主线程处理窗口调用
                    info!("Close requested, shutting down...");
                    match &render {
                        Some(render) => render.request_shutdown(),
                        None => elwt.exit(),
                    }
                }
                Event::WindowEvent {
                    event: WindowEvent::Resized(new_size),
                    ..
                } => {
                    debug!(width = new_size.width, height = new_size.height, "Window resized");
                    framebuffer.resize(new_size.width, new_size.height);
                    if let Some(render) = &render {
                        render.resize(new_size.width as i32, new_size.height as i32);
                    }
                }
                Event::WindowEvent {
                    event: WindowEvent::KeyboardInput { event, .. },
                    ..
                } if event.state == ElementState::Pressed => {
                    if let (Some(render), Some(api)) = (&render, backend_hotkey(&event.logical_key)) {
                        info!(api = %api, "Backend switch requested");
                        render.switch_backend(api);
                    }
                }
                Event::AboutToWait => {
                    let disposed = render
                        .as_ref()
                        .is_some_and(|render| drain_render_events(render, &window, &title));
                    if disposed {
                        if let Some(render) = render.take() {
                            if let Err(e) = render.shutdown() {
                                error!("{}", e);
                            }
                        }
                        elwt.exit();
                    }
                }
                _ => (),
            }
        })
        .map_err(|e| DistCanvasError::Initialization(format!("Event loop error: {}", e)))
}

fn backend_hotkey(key: &Key) -> Option<GraphicsApi> {
    let Key::Character(c) = key else {
        return None;
    };
    match c.as_str() {
        "1" => Some(GraphicsApi::OpenGl),
        "2" => Some(GraphicsApi::Metal),
        "3" => Some(GraphicsApi::Vulkan),
        "4" => Some(GraphicsApi::Direct3D),
        _ => None,
    }
}

/// 返回渲染线程是否已经销毁
fn drain_render_events(render: &RenderThread, window: &Window, title: &str) -> bool {
    let mut disposed = false;
    loop {
        let event = match render.events().try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => return true,
        };
        match event {
            RenderEvent::BackendSelected(api) => {
                info!(api = %api, "Rendering backend selected");
                window.set_title(&format!("{} [{}]", title, api));
            }
            RenderEvent::TargetRecreated {
                width,
                height,
                generation,
            } => debug!(width, height, %generation, "Render target recreated"),
            RenderEvent::ContextFailed(msg) => warn!("Graphics backend unavailable: {}", msg),
            RenderEvent::SurfaceFailed(msg) => warn!("Surface unavailable: {}", msg),
            RenderEvent::ContextLost(msg) => warn!("Graphics context lost, recreating: {}", msg),
            RenderEvent::PaintFailed(msg) | RenderEvent::PresentFailed(msg) => error!("{}", msg),
            RenderEvent::Disposed => {
                info!("Render thread disposed");
                disposed = true;
            }
        }
    }
    disposed
}

/// 演示场景：左右往返的色条
struct BouncingBars {
    start: Instant,
}

impl BouncingBars {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Painter for BouncingBars {
    fn paint(&mut self, canvas: &mut dyn Canvas, frame: &FrameInfo) -> anyhow::Result<()> {
        let (w, h) = (canvas.width() as f32, canvas.height() as f32);
        let t = self.start.elapsed().as_secs_f32();

        canvas.clear(Color::rgb(0.08, 0.09, 0.12));

        const BARS: usize = 6;
        let bar_h = h / (BARS as f32 * 1.5);
        let bar_w = (w * 0.2).max(8.0);
        for i in 0..BARS {
            let phase = t * 0.8 + i as f32 * 0.45;
            let x = (phase.sin() * 0.5 + 0.5) * (w - bar_w);
            let y = bar_h * 0.25 + i as f32 * bar_h * 1.5;
            let hue = i as f32 / BARS as f32;
            let color = Color::rgba(0.3 + 0.7 * hue, 0.9 - 0.6 * hue, 0.6, 0.85);
            canvas.fill_rect(Rect::new(x, y, bar_w, bar_h), color);
        }

        // 每个代数一种颜色的角标，便于观察渲染目标重建
        let marker = match frame.generation.value() % 3 {
            0 => Color::rgb(0.9, 0.3, 0.3),
            1 => Color::rgb(0.3, 0.9, 0.3),
            _ => Color::rgb(0.3, 0.3, 0.9),
        };
        canvas.fill_rect(Rect::new(w - 24.0, h - 24.0, 16.0, 16.0), marker);
        Ok(())
    }
}
