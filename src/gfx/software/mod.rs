//! 软件后端
//!
//! 在 CPU 上光栅化画布命令，所有平台都可用，是后端回退链的最后一环。
//! 呈现的帧发布到 `FrameSink`，由宿主自行读取或拷贝到窗口。

mod context;

pub use context::{FrameSink, SoftwareContext, SoftwareFrame, SoftwareSurface};
