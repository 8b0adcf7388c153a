//! Render pass management
//!
//! Single-subpass passes: color only, or color plus a depth attachment.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// External-to-first-subpass dependency guarding the attachment writes
pub fn subpass_dependency(with_depth: bool) -> vk::SubpassDependency {
    let (stages, access) = if with_depth {
        (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
    } else {
        (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
    };

    vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(stages)
        .dst_access_mask(access)
        .build()
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
    has_depth: bool,
}

impl RenderPass {
    /// Render pass with one color attachment that ends ready for presentation
    pub fn new_color(device: Device, color_format: vk::Format) -> VulkanResult<Self> {
        Self::build(device, color_format, None)
    }

    /// Render pass with a color attachment and a cleared depth attachment
    pub fn new_color_depth(device: Device, color_format: vk::Format, depth_format: vk::Format) -> VulkanResult<Self> {
        Self::build(device, color_format, Some(depth_format))
    }

    fn build(device: Device, color_format: vk::Format, depth_format: Option<vk::Format>) -> VulkanResult<Self> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let mut attachments = vec![color_attachment];
        if let Some(format) = depth_format {
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(format)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .build(),
            );
        }

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if depth_format.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }
        let subpasses = [subpass.build()];

        let dependencies = [subpass_dependency(depth_format.is_some())];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.create_render_pass(&create_info, None).map_err(VulkanError::Api)? };

        log::info!(
            "Render pass created ({:?}{})",
            color_format,
            depth_format.map(|f| format!(" + {f:?}")).unwrap_or_default()
        );

        Ok(Self {
            device,
            render_pass,
            has_depth: depth_format.is_some(),
        })
    }

    /// Whether the pass carries a depth attachment at index 1
    pub fn has_depth(&self) -> bool {
        self.has_depth
    }

    /// Render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_dependency() {
        let dep = subpass_dependency(false);
        assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dep.dst_subpass, 0);
        assert_eq!(dep.dst_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dep.dst_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn test_depth_dependency_covers_early_tests() {
        let dep = subpass_dependency(true);
        assert!(dep
            .src_stage_mask
            .contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS));
        assert!(dep
            .dst_access_mask
            .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE | vk::AccessFlags::COLOR_ATTACHMENT_WRITE));
    }
}
