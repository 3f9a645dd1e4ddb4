/// An acquired swapchain image.
///
/// Short-lived: holding the surface texture prevents acquisition of the next
/// frame. Call [`Gpu::present`](super::Gpu::present) once the frame's commands
/// have been submitted.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}
