//! # Valkeon
//!
//! Thin RAII wrappers over Vulkan objects, plus the configuration, asset
//! loading and frame loop shared by three small GLFW demos: a colored
//! triangle, a depth-tested model and a rotating textured quad.
//!
//! ```rust,no_run
//! use valkeon::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::hello_triangle();
//!     let window = Window::new(&config.window)?;
//!     let context = VulkanContext::new(&window, &config.renderer)?;
//!     let (width, height) = window.framebuffer_size();
//!     let _swapchain = Swapchain::new(&context, ash::vk::Extent2D { width, height })?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc
)]

pub mod assets;
pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

mod application;

pub use application::{is_close_request, run, AppError, Application};

/// Common imports for demo applications
pub mod prelude {
    pub use crate::{
        assets::{load_model, AssetError, ImageData, MeshData},
        core::config::{ApplicationConfig, Config, ConfigError},
        foundation::math::{Mat4, Vec3},
        render::vulkan::{
            Buffer, ColorVertex, CommandRecorder, DepthBuffer, DescriptorPool, DescriptorSetLayout, FrameLoop,
            FrameStatus, Framebuffers, GraphicsPipeline, PipelineDesc, PositionVertex, RenderPass, ShaderModule,
            Swapchain, Texture, VulkanContext, VulkanError, VulkanResult, Window,
        },
        run, AppError, Application,
    };
}
