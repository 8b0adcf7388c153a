//! Vulkan wrappers
//!
//! Each wrapper owns one Vulkan object (or a small group created together)
//! and destroys it on drop. Applications wire them together themselves.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod frame;
pub mod framebuffer;
pub mod image;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex_layout;
pub mod window;

pub use buffer::Buffer;
pub use commands::{color_clear, depth_clear, ActiveRenderPass, CommandPool, CommandRecorder};
pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanInstance, VulkanResult};
pub use descriptor::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder};
pub use frame::{FrameLoop, FrameStatus};
pub use framebuffer::{Framebuffer, Framebuffers};
pub use image::{DepthBuffer, Image};
pub use render_pass::RenderPass;
pub use shader::{GraphicsPipeline, PipelineDesc, ShaderModule};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use texture::Texture;
pub use vertex_layout::{ColorVertex, PositionVertex, VertexLayout};
pub use window::{Window, WindowError, WindowResult};
