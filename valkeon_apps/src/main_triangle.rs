//! Hello Triangle
//!
//! Draws one triangle with per-vertex colors into a fixed-size window.
//! Command buffers are recorded once per swapchain image.
//!
//! Usage: `hello_triangle [config.toml|config.ron]`

use ash::vk;
use valkeon::foundation::logging::{self, LevelFilter};
use valkeon::prelude::*;
use valkeon::render::vulkan::color_clear;

const TRIANGLE: [ColorVertex; 3] = [
    ColorVertex {
        pos: [0.0, -0.5],
        color: [1.0, 0.0, 0.0],
    },
    ColorVertex {
        pos: [0.5, 0.5],
        color: [0.0, 1.0, 0.0],
    },
    ColorVertex {
        pos: [-0.5, 0.5],
        color: [0.0, 0.0, 1.0],
    },
];

// Fields drop top to bottom; the context and window go last
struct HelloTriangle {
    frame_loop: FrameLoop,
    command_buffers: Vec<vk::CommandBuffer>,
    #[allow(dead_code)] // Owned for drop order only
    vertex_buffer: Buffer,
    #[allow(dead_code)] // Owned for drop order only
    pipeline: GraphicsPipeline,
    #[allow(dead_code)] // Owned for drop order only
    framebuffers: Framebuffers,
    #[allow(dead_code)] // Owned for drop order only
    render_pass: RenderPass,
    swapchain: Swapchain,
    context: VulkanContext,
    window: Window,
}

impl HelloTriangle {
    fn new(config: &ApplicationConfig) -> Result<Self, AppError> {
        let window = Window::new(&config.window)?;
        let context = VulkanContext::new(&window, &config.renderer)?;
        let device = context.device().clone();

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(&context, vk::Extent2D { width, height })?;

        let render_pass = RenderPass::new_color(device.clone(), swapchain.format().format)?;
        let framebuffers = Framebuffers::new(&device, render_pass.handle(), &swapchain, None)?;

        let vertex_shader = ShaderModule::from_file(device.clone(), &config.shaders.vertex_shader_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), &config.shaders.fragment_shader_path)?;
        let desc = PipelineDesc::basic(&vertex_shader, &fragment_shader, swapchain.extent()).vertex_layout::<ColorVertex>();
        let pipeline = GraphicsPipeline::new(device.clone(), render_pass.handle(), &desc)?;

        let vertex_buffer = Buffer::host_visible(&context, vk::BufferUsageFlags::VERTEX_BUFFER, &TRIANGLE)?;
        log::info!("Vertex buffer created ({} bytes)", vertex_buffer.size());

        let command_buffers = context.command_pool().allocate(swapchain.image_count() as u32)?;
        let clear_values = [color_clear(config.renderer.clear_color)];
        for (image_index, &command_buffer) in command_buffers.iter().enumerate() {
            let mut recorder = CommandRecorder::new(device.clone(), command_buffer);
            recorder.begin(vk::CommandBufferUsageFlags::empty())?;
            {
                let mut pass = recorder.begin_render_pass(
                    render_pass.handle(),
                    framebuffers.get(image_index)?,
                    swapchain.extent(),
                    &clear_values,
                )?;
                pass.bind_pipeline(pipeline.handle());
                pass.bind_vertex_buffers(&[vertex_buffer.handle()], &[0]);
                pass.draw(TRIANGLE.len() as u32);
            }
            recorder.end()?;
        }
        log::info!("Recorded {} command buffers", command_buffers.len());

        let frame_loop = FrameLoop::new(&device, config.renderer.max_frames_in_flight)?;

        Ok(Self {
            frame_loop,
            command_buffers,
            vertex_buffer,
            pipeline,
            framebuffers,
            render_pass,
            swapchain,
            context,
            window,
        })
    }
}

impl Application for HelloTriangle {
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

        if status == FrameStatus::OutOfDate {
            log::debug!("Swapchain out of date, frame skipped");
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), AppError> {
        Ok(self.context.wait_idle()?)
    }
}

fn run_demo(config_path: Option<&str>) -> Result<(), AppError> {
    let config = ApplicationConfig::load_or(config_path, ApplicationConfig::hello_triangle)?;
    let mut app = HelloTriangle::new(&config)?;
    run(&mut app)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(LevelFilter::Info);
    log::info!("Starting Hello Triangle");

    let config_path = std::env::args().nth(1);
    if let Err(e) = run_demo(config_path.as_deref()) {
        log::error!("Hello Triangle failed: {e}");
        return Err(e.into());
    }

    log::info!("Hello Triangle exited cleanly");
    Ok(())
}
