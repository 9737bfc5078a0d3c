//! 帧统计
//!
//! 每秒结算一次帧率与平均帧时间，由渲染线程以 debug 级别输出。

use std::time::{Duration, Instant};

/// 帧统计
#[derive(Debug, Clone)]
pub struct FrameStats {
    frame_count: u32,
    last_update: Instant,
    fps: f32,
    frame_time_ms: f32,
    total_frames: u64,
    skipped_frames: u64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            frame_count: 0,
            last_update: now,
            fps: 0.0,
            frame_time_ms: 0.0,
            total_frames: 0,
            skipped_frames: 0,
        }
    }

    /// 记录一帧；统计窗口满一秒时返回新的帧率
    pub fn record_frame(&mut self, now: Instant) -> Option<f32> {
        self.frame_count += 1;
        self.total_frames += 1;
        let elapsed = now.duration_since(self.last_update);

        if elapsed < Duration::from_secs(1) {
            return None;
        }

        self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_time_ms = 1000.0 / self.fps;
        self.frame_count = 0;
        self.last_update = now;
        Some(self.fps)
    }

    /// 记录一次被跳过的节拍
    pub fn record_skip(&mut self) {
        self.skipped_frames += 1;
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn frame_time_ms(&self) -> f32 {
        self.frame_time_ms
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}
