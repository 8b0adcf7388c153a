//! Vulkan swapchain management
//!
//! Handles swapchain creation and recreation. The selection rules for format,
//! present mode, extent and image count are plain functions so they can be
//! checked without a device.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::render::vulkan::image::create_image_view;

/// Prefer B8G8R8A8_UNORM in the sRGB nonlinear color space, else the first offered
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_UNORM && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first().copied())
}

/// MAILBOX when offered, otherwise FIFO (always available)
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or the requested size clamped to the
/// supported range when the surface leaves it to the swapchain
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: requested
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: requested
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum (0 means unbounded)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the context's surface
    pub fn new(ctx: &VulkanContext, window_extent: vk::Extent2D) -> VulkanResult<Self> {
        Self::build(ctx, window_extent, vk::SwapchainKHR::null())
    }

    /// Create a replacement swapchain, handing `self` over as the old one
    ///
    /// The caller drops the returned value's predecessor once the device is idle.
    pub fn recreate(&self, ctx: &VulkanContext, window_extent: vk::Extent2D) -> VulkanResult<Self> {
        Self::build(ctx, window_extent, self.swapchain)
    }

    fn build(ctx: &VulkanContext, window_extent: vk::Extent2D, old_swapchain: vk::SwapchainKHR) -> VulkanResult<Self> {
        let surface_loader = ctx.surface_loader();
        let physical = ctx.physical_device().device;
        let surface = ctx.surface();

        let caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical, surface)
                .map_err(VulkanError::Api)?
        };

        let format = choose_surface_format(&formats).ok_or(VulkanError::UnsupportedFormat)?;
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&caps, window_extent);
        let image_count = choose_image_count(&caps);

        let family_indices = [ctx.graphics_family(), ctx.present_family()];
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if family_indices[0] == family_indices[1] {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        let device = ctx.device().clone();
        let swapchain_loader = SwapchainLoader::new(ctx.instance(), &device);

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            match create_image_view(&device, image, format.format, vk::ImageAspectFlags::COLOR) {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    unsafe {
                        for view in image_views {
                            device.destroy_image_view(view, None);
                        }
                        swapchain_loader.destroy_swapchain(swapchain, None);
                    }
                    return Err(e);
                }
            }
        }

        log::info!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            images.len(),
            format.format,
            present_mode
        );

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// One color view per swapchain image
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of images actually created by the driver
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Swapchain extension loader
    pub fn loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_surface_format_prefers_bgra_unorm() {
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let pick = |formats: &[vk::SurfaceFormatKHR]| choose_surface_format(formats).map(|sf| sf.format);

        assert_eq!(pick(&[srgb, unorm]), Some(vk::Format::B8G8R8A8_UNORM));
        assert_eq!(pick(&[srgb]), Some(vk::Format::R8G8B8A8_SRGB));
        assert_eq!(pick(&[]), None);
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_extent_uses_current_or_clamps() {
        let requested = vk::Extent2D {
            width: 4000,
            height: 10,
        };

        let fixed = choose_extent(&caps((800, 600), 2, 3), requested);
        assert_eq!((fixed.width, fixed.height), (800, 600));

        let clamped = choose_extent(&caps((u32::MAX, u32::MAX), 2, 3), requested);
        assert_eq!((clamped.width, clamped.height), (1920, 64));
    }

    #[test]
    fn test_image_count_clamped_to_max() {
        assert_eq!(choose_image_count(&caps((1, 1), 2, 0)), 3);
        assert_eq!(choose_image_count(&caps((1, 1), 2, 8)), 3);
        assert_eq!(choose_image_count(&caps((1, 1), 3, 3)), 3);
    }
}
