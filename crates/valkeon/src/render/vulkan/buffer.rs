//! Buffer management for vertex and index data
//!
//! Host-visible buffers are filled by mapping; device-local buffers are filled
//! through a temporary staging buffer and a one-time copy.

use ash::{vk, Device};
use bytemuck::Pod;

use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};

/// Byte length of `data` as a device size
pub fn byte_size<T: Pod>(data: &[T]) -> vk::DeviceSize {
    std::mem::size_of_val(data) as vk::DeviceSize
}

/// Reject empty writes and writes that do not fit in `capacity` bytes
pub fn check_write(capacity: vk::DeviceSize, len: vk::DeviceSize) -> VulkanResult<()> {
    if len == 0 {
        return Err(VulkanError::InvalidOperation {
            reason: "Buffer data is empty".to_string(),
        });
    }
    if len > capacity {
        return Err(VulkanError::InvalidOperation {
            reason: format!("Write of {len} bytes exceeds buffer size {capacity}"),
        });
    }
    Ok(())
}

/// Buffer wrapper owning its memory
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create an exclusive buffer and bind freshly allocated memory with `properties`
    pub fn new(
        ctx: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Buffer size must be non-zero".to_string(),
            });
        }

        let device = ctx.device().clone();

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None).map_err(VulkanError::Api)? };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = match ctx.find_memory_type(requirements.memory_type_bits, properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Host-visible, host-coherent buffer holding `data`
    pub fn host_visible<T: Pod>(ctx: &VulkanContext, usage: vk::BufferUsageFlags, data: &[T]) -> VulkanResult<Self> {
        let size = byte_size(data);
        check_write(size, size)?;

        let buffer = Self::new(
            ctx,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write(data)?;
        Ok(buffer)
    }

    /// Device-local buffer holding `data`, uploaded through a staging buffer
    pub fn device_local_with_data<T: Pod>(
        ctx: &VulkanContext,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> VulkanResult<Self> {
        let staging = Self::host_visible(ctx, vk::BufferUsageFlags::TRANSFER_SRC, data)?;

        let buffer = Self::new(
            ctx,
            staging.size(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        copy_buffer(ctx, &staging, &buffer, staging.size())?;

        log::debug!("Uploaded {} bytes to device-local buffer", staging.size());
        Ok(buffer)
    }

    /// Copy `data` to the start of the buffer through a temporary mapping
    pub fn write<T: Pod>(&self, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        check_write(self.size, bytes.len() as vk::DeviceSize)?;

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, bytes.len() as vk::DeviceSize, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Requested size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Backing memory
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Copy `size` bytes from `src` to `dst` and wait for completion
pub fn copy_buffer(ctx: &VulkanContext, src: &Buffer, dst: &Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
    if size > src.size() || size > dst.size() {
        return Err(VulkanError::InvalidOperation {
            reason: format!("Copy of {size} bytes exceeds source or destination"),
        });
    }

    let region = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size,
    };

    ctx.command_pool()
        .one_time_submit(ctx.graphics_queue(), |device, command_buffer| unsafe {
            device.cmd_copy_buffer(command_buffer, src.handle(), dst.handle(), &[region]);
        })
}

/// Copy tightly packed pixels from `buffer` into a color image in TRANSFER_DST_OPTIMAL layout
pub fn copy_buffer_to_image(
    ctx: &VulkanContext,
    buffer: &Buffer,
    image: vk::Image,
    extent: vk::Extent2D,
) -> VulkanResult<()> {
    let region = vk::BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
        image_extent: vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
    };

    ctx.command_pool()
        .one_time_submit(ctx.graphics_queue(), |device, command_buffer| unsafe {
            device.cmd_copy_buffer_to_image(
                command_buffer,
                buffer.handle(),
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_of_slices() {
        assert_eq!(byte_size(&[0u32; 6]), 24);
        assert_eq!(byte_size(&[[0.0f32; 3]; 2]), 24);
        assert_eq!(byte_size::<u16>(&[]), 0);
    }

    #[test]
    fn test_write_bounds() {
        assert!(check_write(64, 64).is_ok());
        assert!(check_write(64, 1).is_ok());
        assert!(matches!(
            check_write(64, 65),
            Err(VulkanError::InvalidOperation { .. })
        ));
        assert!(matches!(
            check_write(64, 0),
            Err(VulkanError::InvalidOperation { .. })
        ));
    }
}
