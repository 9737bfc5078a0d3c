/// Build script for DistCanvas
///
/// # Shader Strategy:
/// - wgpu: the WGSL canvas shader is embedded with `include_str!` and compiled at runtime
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=src/gfx/wgpu/shaders/canvas.wgsl");
}
