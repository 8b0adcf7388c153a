//! Device images, image views and layout transitions
//!
//! Covers the depth attachment used by the model demo and the sampled image
//! behind textures.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};

/// 2D image with bound device memory
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Image {
    /// Create a single-mip, single-layer 2D image and bind fresh memory to it
    pub fn new(
        ctx: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        tiling: vk::ImageTiling,
        usage: vk::ImageUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = ctx.device().clone();

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { device.create_image(&image_info, None).map_err(VulkanError::Api)? };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = match ctx.find_memory_type(requirements.memory_type_bits, properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(VulkanError::Api(e));
            }
        };

        if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Self {
            device,
            image,
            memory,
            format,
            extent,
        })
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Image format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Create a 2D view over the first mip level and layer of `image`
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None).map_err(VulkanError::Api) }
}

/// Whether `format` carries a stencil component
pub fn has_stencil_component(format: vk::Format) -> bool {
    format == vk::Format::D32_SFLOAT_S8_UINT || format == vk::Format::D24_UNORM_S8_UINT
}

/// Access masks and pipeline stages for one supported layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBarrier {
    /// Accesses that must complete before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait for the transition
    pub dst_access: vk::AccessFlags,
    /// Stage the transition waits on
    pub src_stage: vk::PipelineStageFlags,
    /// Stage that waits for the transition
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier parameters for the transitions the demos use
pub fn layout_barrier(old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Option<LayoutBarrier> {
    match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => Some(LayoutBarrier {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        }),
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Some(LayoutBarrier {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Some(LayoutBarrier {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        _ => None,
    }
}

/// Aspect mask a barrier on an image of `format` entering `new_layout` must name
pub fn transition_aspect(format: vk::Format, new_layout: vk::ImageLayout) -> vk::ImageAspectFlags {
    if new_layout == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
        if has_stencil_component(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Move `image` between layouts with a one-time pipeline barrier on the graphics queue
pub fn transition_image_layout(
    ctx: &VulkanContext,
    image: vk::Image,
    format: vk::Format,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> VulkanResult<()> {
    let barrier_info = layout_barrier(old_layout, new_layout).ok_or_else(|| VulkanError::InvalidOperation {
        reason: format!("Unsupported layout transition {old_layout:?} -> {new_layout:?}"),
    })?;

    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: transition_aspect(format, new_layout),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(barrier_info.src_access)
        .dst_access_mask(barrier_info.dst_access)
        .build();

    ctx.command_pool()
        .one_time_submit(ctx.graphics_queue(), |device, command_buffer| unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                barrier_info.src_stage,
                barrier_info.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })
}

/// Depth attachment shared by every framebuffer of a swapchain
pub struct DepthBuffer {
    device: Device,
    image_view: vk::ImageView,
    image: Image,
}

impl DepthBuffer {
    /// Create a device-local depth image in the preferred depth format,
    /// ready in DEPTH_STENCIL_ATTACHMENT_OPTIMAL layout
    pub fn new(ctx: &VulkanContext, extent: vk::Extent2D) -> VulkanResult<Self> {
        let format = ctx.find_depth_format()?;
        Self::with_format(ctx, extent, format)
    }

    /// Same as [`DepthBuffer::new`] with an explicit format
    pub fn with_format(ctx: &VulkanContext, extent: vk::Extent2D, format: vk::Format) -> VulkanResult<Self> {
        let image = Image::new(
            ctx,
            extent,
            format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let image_view = create_image_view(ctx.device(), image.handle(), format, vk::ImageAspectFlags::DEPTH)?;
        let depth = Self {
            device: ctx.device().clone(),
            image_view,
            image,
        };

        transition_image_layout(
            ctx,
            depth.image.handle(),
            format,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )?;

        log::info!("Depth buffer created ({:?}, {}x{})", format, extent.width, extent.height);
        Ok(depth)
    }

    /// Depth image view
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Depth format
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.image_view, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_transition_barrier() {
        let barrier = layout_barrier(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .expect("depth transition is supported");

        assert_eq!(barrier.src_access, vk::AccessFlags::empty());
        assert!(barrier
            .dst_access
            .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert_eq!(barrier.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(barrier.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn test_unsupported_transition() {
        assert!(layout_barrier(vk::ImageLayout::PRESENT_SRC_KHR, vk::ImageLayout::UNDEFINED).is_none());
    }

    #[test]
    fn test_stencil_formats_get_stencil_aspect() {
        let layout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
        assert_eq!(
            transition_aspect(vk::Format::D32_SFLOAT, layout),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            transition_aspect(vk::Format::D24_UNORM_S8_UINT, layout),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            transition_aspect(vk::Format::R8G8B8A8_UNORM, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            vk::ImageAspectFlags::COLOR
        );
    }
}
