//! Sampled 2D textures uploaded from decoded RGBA8 images

use ash::{vk, Device};

use crate::assets::ImageData;
use crate::render::vulkan::buffer::{copy_buffer_to_image, Buffer};
use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::render::vulkan::image::{create_image_view, transition_image_layout, Image};

/// Texel format of every uploaded texture
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Check that `image` is non-empty tightly packed RGBA8
pub fn validate_rgba8(image: &ImageData) -> VulkanResult<()> {
    let expected = image.width as usize * image.height as usize * 4;
    if image.width == 0 || image.height == 0 || image.channels != 4 || image.data.len() != expected {
        return Err(VulkanError::InvalidOperation {
            reason: format!(
                "Texture data must be RGBA8: {}x{} with {} channels and {} bytes",
                image.width,
                image.height,
                image.channels,
                image.data.len()
            ),
        });
    }
    Ok(())
}

/// Device-local image with a color view and a linear repeating sampler
pub struct Texture {
    device: Device,
    sampler: vk::Sampler,
    image_view: vk::ImageView,
    image: Image,
}

impl Texture {
    /// Upload `image` through a staging buffer and leave it in SHADER_READ_ONLY_OPTIMAL
    pub fn from_image_data(ctx: &VulkanContext, image: &ImageData) -> VulkanResult<Self> {
        validate_rgba8(image)?;

        let extent = vk::Extent2D {
            width: image.width,
            height: image.height,
        };

        let staging = Buffer::host_visible(ctx, vk::BufferUsageFlags::TRANSFER_SRC, &image.data)?;

        let gpu_image = Image::new(
            ctx,
            extent,
            TEXTURE_FORMAT,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        transition_image_layout(
            ctx,
            gpu_image.handle(),
            TEXTURE_FORMAT,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        copy_buffer_to_image(ctx, &staging, gpu_image.handle(), extent)?;
        transition_image_layout(
            ctx,
            gpu_image.handle(),
            TEXTURE_FORMAT,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;
        drop(staging);

        let device = ctx.device().clone();
        let image_view = create_image_view(&device, gpu_image.handle(), TEXTURE_FORMAT, vk::ImageAspectFlags::COLOR)?;

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = match unsafe { device.create_sampler(&sampler_info, None) } {
            Ok(sampler) => sampler,
            Err(e) => {
                unsafe { device.destroy_image_view(image_view, None) };
                return Err(VulkanError::Api(e));
            }
        };

        log::info!("Texture created ({}x{})", extent.width, extent.height);

        Ok(Self {
            device,
            sampler,
            image_view,
            image: gpu_image,
        })
    }

    /// Color view over the texture
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Sampler to pair with the view
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Texture size in texels
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.image_view, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_validation() {
        assert!(validate_rgba8(&ImageData::solid_color(2, 3, [1, 2, 3, 4])).is_ok());

        let mut truncated = ImageData::solid_color(2, 2, [0; 4]);
        truncated.data.pop();
        assert!(validate_rgba8(&truncated).is_err());

        assert!(validate_rgba8(&ImageData::solid_color(0, 4, [0; 4])).is_err());
    }
}
