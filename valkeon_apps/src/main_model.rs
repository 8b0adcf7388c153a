//! Model Loading
//!
//! Loads a mesh (glTF or OBJ), uploads it to device-local buffers and draws it
//! depth-tested from a fixed camera. The MVP matrix is pushed as a constant.
//!
//! Usage: `model_loading [config.toml|config.ron]`

use ash::vk;
use valkeon::foundation::logging::{self, LevelFilter};
use valkeon::foundation::math::{aspect_ratio, look_at, mat4_bytes, perspective_vk};
use valkeon::prelude::*;
use valkeon::render::vulkan::{color_clear, depth_clear};

struct ModelLoading {
    frame_loop: FrameLoop,
    command_buffers: Vec<vk::CommandBuffer>,
    #[allow(dead_code)] // Owned for drop order only
    pipeline: GraphicsPipeline,
    #[allow(dead_code)] // Owned for drop order only
    index_buffer: Buffer,
    #[allow(dead_code)] // Owned for drop order only
    vertex_buffer: Buffer,
    #[allow(dead_code)] // Owned for drop order only
    framebuffers: Framebuffers,
    #[allow(dead_code)] // Owned for drop order only
    render_pass: RenderPass,
    #[allow(dead_code)] // Owned for drop order only
    depth: DepthBuffer,
    swapchain: Swapchain,
    context: VulkanContext,
    window: Window,
}

fn model_view_projection(config: &ApplicationConfig, extent: vk::Extent2D) -> Mat4 {
    let camera = &config.camera;
    let projection = perspective_vk(camera.fov_y_radians(), aspect_ratio(extent), camera.near, camera.far);
    let view = look_at(
        &Vec3::from(camera.eye),
        &Vec3::from(camera.direction),
        &Vec3::from(camera.up),
    );
    projection * view * Mat4::identity()
}

impl ModelLoading {
    fn new(config: &ApplicationConfig) -> Result<Self, AppError> {
        let mesh = load_model(config.require_model_path()?)?;
        log::info!(
            "Loaded {} vertices, {} triangles",
            mesh.positions.len(),
            mesh.triangle_count()
        );

        let window = Window::new(&config.window)?;
        let context = VulkanContext::new(&window, &config.renderer)?;
        let device = context.device().clone();

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(&context, vk::Extent2D { width, height })?;
        let extent = swapchain.extent();

        let depth = DepthBuffer::new(&context, extent)?;
        let render_pass = RenderPass::new_color_depth(device.clone(), swapchain.format().format, depth.format())?;
        let framebuffers = Framebuffers::new(&device, render_pass.handle(), &swapchain, Some(depth.image_view()))?;

        let vertices: Vec<PositionVertex> = mesh.positions.iter().copied().map(PositionVertex::from).collect();
        let vertex_buffer = Buffer::device_local_with_data(&context, vk::BufferUsageFlags::VERTEX_BUFFER, &vertices)?;
        let index_buffer = Buffer::device_local_with_data(&context, vk::BufferUsageFlags::INDEX_BUFFER, &mesh.indices)?;

        let vertex_shader = ShaderModule::from_file(device.clone(), &config.shaders.vertex_shader_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), &config.shaders.fragment_shader_path)?;
        let desc = PipelineDesc::with_mvp(&vertex_shader, &fragment_shader, extent).vertex_layout::<PositionVertex>();
        let pipeline = GraphicsPipeline::new(device.clone(), render_pass.handle(), &desc)?;

        let mvp = model_view_projection(config, extent);
        let index_count = mesh.indices.len() as u32;
        let clear_values = [color_clear(config.renderer.clear_color), depth_clear(1.0)];

        let command_buffers = context.command_pool().allocate(swapchain.image_count() as u32)?;
        for (image_index, &command_buffer) in command_buffers.iter().enumerate() {
            let mut recorder = CommandRecorder::new(device.clone(), command_buffer);
            recorder.begin(vk::CommandBufferUsageFlags::empty())?;
            {
                let mut pass = recorder.begin_render_pass(
                    render_pass.handle(),
                    framebuffers.get(image_index)?,
                    extent,
                    &clear_values,
                )?;
                pass.bind_pipeline(pipeline.handle());
                pass.bind_vertex_buffers(&[vertex_buffer.handle()], &[0]);
                pass.bind_index_buffer(index_buffer.handle(), vk::IndexType::UINT32);
                pass.push_constants(pipeline.layout(), vk::ShaderStageFlags::VERTEX, mat4_bytes(&mvp));
                pass.draw_indexed(index_count);
            }
            recorder.end()?;
        }

        let frame_loop = FrameLoop::new(&device, config.renderer.max_frames_in_flight)?;

        Ok(Self {
            frame_loop,
            command_buffers,
            pipeline,
            index_buffer,
            vertex_buffer,
            framebuffers,
            render_pass,
            depth,
            swapchain,
            context,
            window,
        })
    }
}

impl Application for ModelLoading {
    fn window(&mut self) -> &mut Window {
        &mut self.window
    }

    fn draw_frame(&mut self) -> Result<(), AppError> {
        let command_buffers = &self.command_buffers;
        let status = self
            .frame_loop
            .draw_frame(&self.context, &self.swapchain, |image_index, _| {
                command_buffers
                    .get(image_index as usize)
                    .copied()
                    .ok_or_else(|| VulkanError::InvalidOperation {
                        reason: format!("No command buffer for image {image_index}"),
                    })
            })?;

        if status.needs_recreate() {
            log::debug!("Swapchain no longer matches the surface: {status:?}");
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), AppError> {
        Ok(self.context.wait_idle()?)
    }
}

fn run_demo(config_path: Option<&str>) -> Result<(), AppError> {
    let config = ApplicationConfig::load_or(config_path, ApplicationConfig::model_loading)?;
    let mut app = ModelLoading::new(&config)?;
    run(&mut app)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(LevelFilter::Info);
    log::info!("Starting Model Loading");

    let config_path = std::env::args().nth(1);
    if let Err(e) = run_demo(config_path.as_deref()) {
        log::error!("Model Loading failed: {e}");
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use valkeon::foundation::math::Vec4;

    #[test]
    fn test_default_camera_sees_origin() {
        let config = ApplicationConfig::model_loading();
        let mvp = model_view_projection(&config, vk::Extent2D { width: 800, height: 600 });
        let clip = mvp * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(clip.w > 0.0);
        assert!((clip.x / clip.w).abs() < 1e-5);
        assert!((clip.y / clip.w).abs() < 1e-5);
        let depth = clip.z / clip.w;
        assert!(depth > -1.0 && depth < 1.0);
    }
}
