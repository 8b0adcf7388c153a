//! Quad Texture
//!
//! Draws a textured quad spinning around Z in a resizable window. The quad's
//! corners come from the vertex index, so no vertex buffer is bound. Each
//! frame slot re-records its own command buffer with the current MVP.
//!
//! Usage: `quad_texture [config.toml|config.ron]`

use ash::vk;
use valkeon::foundation::logging::{self, LevelFilter};
use valkeon::foundation::math::{aspect_ratio, mat4_bytes, ortho, rotation_z};
use valkeon::prelude::*;
use valkeon::render::vulkan::shader::MAT4_PUSH_CONSTANT_SIZE;
use valkeon::render::vulkan::color_clear;

const QUAD_VERTEX_COUNT: u32 = 4;
const TEXTURE_BINDING: u32 = 0;

/// Spinning quad transform for a framebuffer of `extent` at `time` seconds
fn quad_mvp(extent: vk::Extent2D, time: f32) -> Mat4 {
    let ratio = aspect_ratio(extent);
    ortho(-ratio, ratio, -1.0, 1.0, 1.0, -1.0) * rotation_z(time)
}

/// Whether the swapchain has to be rebuilt before drawing at `size`
///
/// Compares against the last requested size, not the extent the surface granted.
fn swapchain_stale(size: (u32, u32), requested: (u32, u32), last_status_stale: bool) -> bool {
    last_status_stale || size != requested
}

struct QuadTexture {
    frame_loop: FrameLoop,
    command_buffers: Vec<vk::CommandBuffer>,
    pipeline: GraphicsPipeline,
    descriptor_set: vk::DescriptorSet,
    #[allow(dead_code)] // Owned for drop order only
    descriptor_pool: DescriptorPool,
    #[allow(dead_code)] // Owned for drop order only
    set_layout: DescriptorSetLayout,
    texture: Texture,
    framebuffers: Framebuffers,
    render_pass: RenderPass,
    swapchain: Swapchain,
    context: VulkanContext,
    window: Window,
    clear_color: [f32; 4],
    requested_size: (u32, u32),
    needs_recreate: bool,
}

impl QuadTexture {
    fn new(config: &ApplicationConfig) -> Result<Self, AppError> {
        let image = ImageData::from_file(config.require_texture_path()?)?;

        let window = Window::new(&config.window)?;
        let context = VulkanContext::new(&window, &config.renderer)?;
        let device = context.device().clone();

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(&context, vk::Extent2D { width, height })?;

        let render_pass = RenderPass::new_color(device.clone(), swapchain.format().format)?;
        let framebuffers = Framebuffers::new(&device, render_pass.handle(), &swapchain, None)?;

        let texture = Texture::from_image_data(&context, &image)?;

        let set_layout = DescriptorSetLayout::builder()
            .add_combined_image_sampler(TEXTURE_BINDING, vk::ShaderStageFlags::FRAGMENT)
            .build(&device)?;
        let descriptor_pool = DescriptorPool::for_layout(&device, &set_layout, 1)?;
        let descriptor_set = descriptor_pool
            .allocate(&[set_layout.handle()])?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "Descriptor pool returned no sets".to_string(),
            })?;
        descriptor_pool.write_image(descriptor_set, TEXTURE_BINDING, &texture);

        let vertex_shader = ShaderModule::from_file(device.clone(), &config.shaders.vertex_shader_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), &config.shaders.fragment_shader_path)?;
        let desc = PipelineDesc::basic(&vertex_shader, &fragment_shader, swapchain.extent())
            .topology(vk::PrimitiveTopology::TRIANGLE_STRIP)
            .cull(vk::CullModeFlags::BACK, vk::FrontFace::CLOCKWISE)
            .dynamic_viewport()
            .push_constant(vk::ShaderStageFlags::VERTEX, MAT4_PUSH_CONSTANT_SIZE)
            .set_layout(set_layout.handle());
        let pipeline = GraphicsPipeline::new(device.clone(), render_pass.handle(), &desc)?;

        let frame_loop = FrameLoop::new(&device, config.renderer.max_frames_in_flight)?;
        let command_buffers = context
            .command_pool()
            .allocate(frame_loop.frames_in_flight() as u32)?;

        Ok(Self {
            frame_loop,
            command_buffers,
            pipeline,
            descriptor_set,
            descriptor_pool,
            set_layout,
            texture,
            framebuffers,
            render_pass,
            swapchain,
            context,
            window,
            clear_color: config.renderer.clear_color,
            requested_size: (width, height),
            needs_recreate: false,
        })
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<(), AppError> {
        self.context.wait_idle()?;

        let swapchain = self.swapchain.recreate(&self.context, vk::Extent2D { width, height })?;
        let framebuffers = Framebuffers::new(self.context.device(), self.render_pass.handle(), &swapchain, None)?;

        // Old framebuffers go before the swapchain whose views they use
        self.framebuffers = framebuffers;
        self.swapchain = swapchain;
        self.frame_loop.reset_images();
        self.requested_size = (width, height);
        self.needs_recreate = false;

        let extent = self.swapchain.extent();
        log::info!("Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }
}

impl Application for QuadTexture {
    fn window(&mut self) -> &mut Window {
        &mut self.window
    }

    fn draw_frame(&mut self) -> Result<(), AppError> {
        let (width, height) = self.window.framebuffer_size();
        if width == 0 || height == 0 {
            return Ok(());
        }

        if swapchain_stale((width, height), self.requested_size, self.needs_recreate) {
            self.recreate_swapchain(width, height)?;
        }

        let extent = self.swapchain.extent();
        let mvp = quad_mvp(extent, self.window.time() as f32);
        let clear_values = [color_clear(self.clear_color)];

        let device = self.context.device();
        let command_buffers = &self.command_buffers;
        let framebuffers = &self.framebuffers;
        let render_pass = self.render_pass.handle();
        let pipeline = &self.pipeline;
        let descriptor_set = self.descriptor_set;

        let status = self
            .frame_loop
            .draw_frame(&self.context, &self.swapchain, |image_index, frame_index| {
                let command_buffer = command_buffers.get(frame_index).copied().ok_or_else(|| {
                    VulkanError::InvalidOperation {
                        reason: format!("No command buffer for frame {frame_index}"),
                    }
                })?;

                let mut recorder = CommandRecorder::new(device.clone(), command_buffer);
                recorder.reset()?;
                recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
                {
                    let mut pass = recorder.begin_render_pass(
                        render_pass,
                        framebuffers.get(image_index as usize)?,
                        extent,
                        &clear_values,
                    )?;
                    pass.bind_pipeline(pipeline.handle());
                    pass.set_viewport(extent);
                    pass.set_scissor(extent);
                    pass.bind_descriptor_sets(pipeline.layout(), &[descriptor_set]);
                    pass.push_constants(pipeline.layout(), vk::ShaderStageFlags::VERTEX, mat4_bytes(&mvp));
                    pass.draw(QUAD_VERTEX_COUNT);
                }
                recorder.end()
            })?;

        self.needs_recreate = status.needs_recreate();
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), AppError> {
        Ok(self.context.wait_idle()?)
    }

    fn framebuffer_resized(&mut self, width: u32, height: u32) {
        log::debug!("Framebuffer resized to {width}x{height}");
        self.needs_recreate = true;
    }
}

fn run_demo(config_path: Option<&str>) -> Result<(), AppError> {
    let config = ApplicationConfig::load_or(config_path, ApplicationConfig::quad_texture)?;
    let mut app = QuadTexture::new(&config)?;
    log::info!("Texture is {}x{}", app.texture.extent().width, app.texture.extent().height);
    run(&mut app)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(LevelFilter::Info);
    log::info!("Starting Quad Texture");

    let config_path = std::env::args().nth(1);
    if let Err(e) = run_demo(config_path.as_deref()) {
        log::error!("Quad Texture failed: {e}");
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use valkeon::foundation::math::Vec4;

    fn project(mvp: &Mat4, x: f32, y: f32) -> (f32, f32) {
        let clip = mvp * Vec4::new(x, y, 0.0, 1.0);
        (clip.x / clip.w, clip.y / clip.w)
    }

    #[test]
    fn test_quad_keeps_aspect() {
        let mvp = quad_mvp(vk::Extent2D { width: 1600, height: 800 }, 0.0);
        let (x, y) = project(&mvp, 1.0, 1.0);
        assert!((x - 0.5).abs() < 1e-5);
        assert!((y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_quad_rotates_with_time() {
        let extent = vk::Extent2D { width: 600, height: 600 };
        let (x, y) = project(&quad_mvp(extent, std::f32::consts::FRAC_PI_2), 1.0, 0.0);
        assert!(x.abs() < 1e-5);
        assert!((y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_swapchain_staleness() {
        assert!(!swapchain_stale((800, 600), (800, 600), false));
        assert!(swapchain_stale((800, 600), (800, 600), true));
        assert!(swapchain_stale((1024, 600), (800, 600), false));
    }

    #[test]
    fn test_clamped_extent_is_not_stale() {
        // Surface capped the 4000x3000 request at 2048x2048
        let granted = vk::Extent2D { width: 2048, height: 2048 };
        let requested = (4000, 3000);
        assert_ne!(requested, (granted.width, granted.height));
        assert!(!swapchain_stale(requested, requested, false));
    }
}
