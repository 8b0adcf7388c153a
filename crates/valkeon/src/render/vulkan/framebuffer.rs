//! Framebuffer management
//!
//! One framebuffer per swapchain image, optionally sharing a depth view.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};
use crate::render::vulkan::swapchain::Swapchain;

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a new single-layer framebuffer
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.create_framebuffer(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Self { device, framebuffer })
    }

    /// Framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Attachment list for one swapchain image: color first, then the shared depth view
pub fn attachments_for(color: vk::ImageView, depth: Option<vk::ImageView>) -> Vec<vk::ImageView> {
    std::iter::once(color).chain(depth).collect()
}

/// Framebuffers indexed by swapchain image index
pub struct Framebuffers {
    framebuffers: Vec<Framebuffer>,
}

impl Framebuffers {
    /// Build one framebuffer per swapchain image view
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        swapchain: &Swapchain,
        depth_view: Option<vk::ImageView>,
    ) -> VulkanResult<Self> {
        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                Framebuffer::new(
                    device.clone(),
                    render_pass,
                    &attachments_for(view, depth_view),
                    swapchain.extent(),
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::info!("Created {} framebuffers", framebuffers.len());
        Ok(Self { framebuffers })
    }

    /// Framebuffer for swapchain image `index`
    pub fn get(&self, index: usize) -> VulkanResult<vk::Framebuffer> {
        self.framebuffers
            .get(index)
            .map(Framebuffer::handle)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("No framebuffer for swapchain image {index}"),
            })
    }

    /// Number of framebuffers
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Whether there are no framebuffers
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_attachment_order() {
        let color = vk::ImageView::from_raw(1);
        let depth = vk::ImageView::from_raw(2);

        assert_eq!(attachments_for(color, None), vec![color]);
        assert_eq!(attachments_for(color, Some(depth)), vec![color, depth]);
    }
}
