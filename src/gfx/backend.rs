//! 图形后端能力查询层
//!
//! 本模块只回答两个问题：某个图形 API 在当前平台上是否可用，
//! 以及按什么顺序尝试它们。它是无状态的，只在创建/重建上下文时被查询，
//! 绝不会在绘制一帧的过程中被调用。

use tracing::debug;

use super::GraphicsApi;

/// 图形后端能力查询接口
pub trait GraphicsBackend: Send + Sync {
    /// 指定 API 是否可用
    fn is_available(&self, api: GraphicsApi) -> bool;

    /// 按平台偏好排列的 API 顺序，最后一项总是 `Software`
    fn preferred_order(&self) -> Vec<GraphicsApi>;

    /// 计算实际尝试顺序
    ///
    /// 指定了 `forced` 时只尝试这一个 API，否则使用 `preferred_order()`。
    fn selection_order(&self, forced: Option<GraphicsApi>) -> Vec<GraphicsApi> {
        match forced {
            Some(api) => vec![api],
            None => self.preferred_order(),
        }
    }
}

/// 当前平台的默认偏好顺序
///
/// - macOS：Metal → OpenGL → Software
/// - Windows：Direct3D → Vulkan → OpenGL → Software
/// - 其他平台：Vulkan → OpenGL → Software
pub fn platform_preferred_order() -> Vec<GraphicsApi> {
    if cfg!(target_os = "macos") {
        vec![GraphicsApi::Metal, GraphicsApi::OpenGl, GraphicsApi::Software]
    } else if cfg!(target_os = "windows") {
        vec![
            GraphicsApi::Direct3D,
            GraphicsApi::Vulkan,
            GraphicsApi::OpenGl,
            GraphicsApi::Software,
        ]
    } else {
        vec![GraphicsApi::Vulkan, GraphicsApi::OpenGl, GraphicsApi::Software]
    }
}

/// 通过原生驱动探测可用性的后端查询
///
/// - Vulkan：能否加载 Vulkan loader（ash）
/// - Metal：是否存在系统默认 Metal 设备（metal，仅 macOS）
/// - Direct3D：能否创建 feature level 11.0 的 D3D12 设备（windows，仅 Windows）
/// - OpenGL：wgpu 的 GL 后端能否枚举到适配器
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

impl SystemBackend {
    pub fn new() -> Self {
        Self
    }

    fn probe_vulkan() -> bool {
        // SAFETY: 只加载 loader 动态库并立即释放，不调用任何 Vulkan 函数
        let entry = unsafe { ash::Entry::load() };
        entry.is_ok()
    }

    #[cfg(target_os = "macos")]
    fn probe_metal() -> bool {
        metal::Device::system_default().is_some()
    }

    #[cfg(not(target_os = "macos"))]
    fn probe_metal() -> bool {
        false
    }

    #[cfg(target_os = "windows")]
    fn probe_direct3d() -> bool {
        use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_11_0;
        use windows::Win32::Graphics::Direct3D12::{D3D12CreateDevice, ID3D12Device};

        let mut device: Option<ID3D12Device> = None;
        // SAFETY: 传入有效的输出指针，设备在离开作用域时释放
        let created = unsafe { D3D12CreateDevice(None, D3D_FEATURE_LEVEL_11_0, &mut device) };
        created.is_ok() && device.is_some()
    }

    #[cfg(not(target_os = "windows"))]
    fn probe_direct3d() -> bool {
        false
    }

    fn probe_opengl() -> bool {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::GL,
            ..Default::default()
        });
        !instance.enumerate_adapters(wgpu::Backends::GL).is_empty()
    }
}

impl GraphicsBackend for SystemBackend {
    fn is_available(&self, api: GraphicsApi) -> bool {
        let available = match api {
            GraphicsApi::Vulkan => Self::probe_vulkan(),
            GraphicsApi::Metal => Self::probe_metal(),
            GraphicsApi::Direct3D => Self::probe_direct3d(),
            GraphicsApi::OpenGl => Self::probe_opengl(),
            GraphicsApi::Software => true,
        };
        debug!(api = %api, available, "Probed graphics backend");
        available
    }

    fn preferred_order(&self) -> Vec<GraphicsApi> {
        platform_preferred_order()
    }
}

/// 固定能力表
///
/// 用于无头环境或宿主已经知道可用后端的场合（例如嵌入到已有的 GL 宿主中）。
#[derive(Debug, Clone)]
pub struct FixedBackend {
    available: Vec<GraphicsApi>,
    order: Vec<GraphicsApi>,
}

impl FixedBackend {
    pub fn new(available: Vec<GraphicsApi>, order: Vec<GraphicsApi>) -> Self {
        Self { available, order }
    }

    /// 只有软件后端
    pub fn software_only() -> Self {
        Self::new(vec![GraphicsApi::Software], vec![GraphicsApi::Software])
    }
}

impl GraphicsBackend for FixedBackend {
    fn is_available(&self, api: GraphicsApi) -> bool {
        self.available.contains(&api)
    }

    fn preferred_order(&self) -> Vec<GraphicsApi> {
        self.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_order_ends_with_software() {
        let order = platform_preferred_order();
        assert_eq!(order.last(), Some(&GraphicsApi::Software));
        assert_eq!(order.iter().filter(|a| **a == GraphicsApi::Software).count(), 1);
    }

    #[test]
    fn test_software_always_available() {
        assert!(SystemBackend::new().is_available(GraphicsApi::Software));
    }

    #[test]
    fn test_platform_exclusive_apis() {
        let backend = SystemBackend::new();
        if !cfg!(target_os = "macos") {
            assert!(!backend.is_available(GraphicsApi::Metal));
        }
        if !cfg!(target_os = "windows") {
            assert!(!backend.is_available(GraphicsApi::Direct3D));
        }
    }

    #[test]
    fn test_selection_order_respects_forced_api() {
        let backend = FixedBackend::new(
            vec![GraphicsApi::OpenGl, GraphicsApi::Software],
            vec![GraphicsApi::Metal, GraphicsApi::OpenGl, GraphicsApi::Software],
        );
        assert_eq!(
            backend.selection_order(None),
            vec![GraphicsApi::Metal, GraphicsApi::OpenGl, GraphicsApi::Software]
        );
        assert_eq!(
            backend.selection_order(Some(GraphicsApi::Vulkan)),
            vec![GraphicsApi::Vulkan]
        );
        assert!(!backend.is_available(GraphicsApi::Metal));
    }
}
