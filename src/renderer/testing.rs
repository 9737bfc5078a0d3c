//! 测试用的脚本化后端
//!
//! `MockFactory` 创建的上下文和表面把生命周期事件写入共享的 `Journal`，
//! 测试据此断言创建/释放顺序。失败通过 `Script` 注入。

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::canvas::{Canvas, RecordingCanvas, Surface};
use crate::core::error::GraphicsError;
use crate::gfx::target::{FramebufferBinding, FramebufferSource, HeadlessFramebuffer, RenderTarget};
use crate::gfx::{ContextFactory, GpuContext, GraphicsApi};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    ContextCreated(GraphicsApi),
    ContextReleased(GraphicsApi),
    SurfaceCreated { width: u32, height: u32 },
    SurfaceReleased { width: u32, height: u32 },
    Presented { width: u32, height: u32, ops: usize },
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Entry>>>);

impl Journal {
    fn record(&self, entry: Entry) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Entry) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    pub fn presents(&self) -> usize {
        self.count(|e| matches!(e, Entry::Presented { .. }))
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    failing_apis: HashSet<GraphicsApi>,
    surface_failures: usize,
    present_errors: VecDeque<GraphicsError>,
}

/// 失败注入
#[derive(Debug, Clone, Default)]
pub struct Script(Arc<Mutex<ScriptState>>);

impl Script {
    /// 该 API 的上下文创建总是失败
    pub fn fail_context(&self, api: GraphicsApi) {
        self.0.lock().unwrap().failing_apis.insert(api);
    }

    /// 接下来 `n` 次 `make_surface` 返回 `None`
    pub fn fail_surfaces(&self, n: usize) {
        self.0.lock().unwrap().surface_failures = n;
    }

    /// 下一次呈现返回给定错误
    pub fn fail_present(&self, err: GraphicsError) {
        self.0.lock().unwrap().present_errors.push_back(err);
    }
}

pub struct MockFactory {
    journal: Journal,
    script: Script,
    framebuffer: HeadlessFramebuffer,
}

impl MockFactory {
    pub fn new(journal: Journal, script: Script, framebuffer: HeadlessFramebuffer) -> Self {
        Self {
            journal,
            script,
            framebuffer,
        }
    }
}

impl ContextFactory for MockFactory {
    fn create_context(&mut self, api: GraphicsApi) -> Result<Box<dyn GpuContext>, GraphicsError> {
        if self.script.0.lock().unwrap().failing_apis.contains(&api) {
            return Err(GraphicsError::ContextCreation {
                api,
                reason: "scripted failure".to_string(),
            });
        }
        self.journal.record(Entry::ContextCreated(api));
        Ok(Box::new(MockContext {
            api,
            journal: self.journal.clone(),
            script: self.script.clone(),
            framebuffer: self.framebuffer.clone(),
        }))
    }
}

struct MockContext {
    api: GraphicsApi,
    journal: Journal,
    script: Script,
    framebuffer: HeadlessFramebuffer,
}

impl GpuContext for MockContext {
    fn api(&self) -> GraphicsApi {
        self.api
    }

    fn framebuffer(&self) -> FramebufferBinding {
        self.framebuffer.query()
    }

    fn make_surface(&mut self, target: &RenderTarget) -> Option<Box<dyn Surface>> {
        {
            let mut state = self.script.0.lock().unwrap();
            if state.surface_failures > 0 {
                state.surface_failures -= 1;
                return None;
            }
        }
        self.journal.record(Entry::SurfaceCreated {
            width: target.width,
            height: target.height,
        });
        Some(Box::new(MockSurface {
            canvas: RecordingCanvas::new(target.width, target.height),
            journal: self.journal.clone(),
            script: self.script.clone(),
        }))
    }
}

impl Drop for MockContext {
    fn drop(&mut self) {
        self.journal.record(Entry::ContextReleased(self.api));
    }
}

struct MockSurface {
    canvas: RecordingCanvas,
    journal: Journal,
    script: Script,
}

impl Surface for MockSurface {
    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn flush_and_present(&mut self) -> Result<(), GraphicsError> {
        let list = self.canvas.take();
        if let Some(err) = self.script.0.lock().unwrap().present_errors.pop_front() {
            return Err(err);
        }
        self.journal.record(Entry::Presented {
            width: self.canvas.width(),
            height: self.canvas.height(),
            ops: list.ops().len(),
        });
        Ok(())
    }
}

impl Drop for MockSurface {
    fn drop(&mut self) {
        self.journal.record(Entry::SurfaceReleased {
            width: self.canvas.width(),
            height: self.canvas.height(),
        });
    }
}
