//! Command buffer management
//!
//! Pool ownership, one-time submission for uploads and layout transitions,
//! and a recorder whose render pass scope ends when its guard drops.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Clear value for a color attachment
pub fn color_clear(rgba: [f32; 4]) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue { float32: rgba },
    }
}

/// Clear value for a depth attachment, stencil cleared to 0
pub fn depth_clear(depth: f32) -> vk::ClearValue {
    vk::ClearValue {
        depth_stencil: vk::ClearDepthStencilValue { depth, stencil: 0 },
    }
}

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, command_pool })
    }

    /// Allocate `count` primary command buffers
    pub fn allocate(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Return command buffers to the pool
    pub fn free(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.command_pool, command_buffers);
        }
    }

    /// Allocate one command buffer and begin it for a single submission
    pub fn begin_single_time(&self) -> VulkanResult<vk::CommandBuffer> {
        let command_buffer = self
            .allocate(1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "Driver returned no command buffer".to_string(),
            })?;

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        if let Err(e) = unsafe { self.device.begin_command_buffer(command_buffer, &begin_info) } {
            self.free(&[command_buffer]);
            return Err(VulkanError::Api(e));
        }

        Ok(command_buffer)
    }

    /// End, submit and wait for a buffer from [`CommandPool::begin_single_time`], then free it
    pub fn end_single_time(&self, command_buffer: vk::CommandBuffer, queue: vk::Queue) -> VulkanResult<()> {
        let result = unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .and_then(|()| {
                    let buffers = [command_buffer];
                    let submit = vk::SubmitInfo::builder().command_buffers(&buffers).build();
                    self.device.queue_submit(queue, &[submit], vk::Fence::null())
                })
                .and_then(|()| self.device.queue_wait_idle(queue))
        };

        self.free(&[command_buffer]);
        result.map_err(VulkanError::Api)
    }

    /// Record commands with `record` and execute them synchronously on `queue`
    pub fn one_time_submit<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffer = self.begin_single_time()?;
        record(&self.device, command_buffer);
        self.end_single_time(command_buffer, queue)
    }

    /// Command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            // Frees every buffer allocated from the pool
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Records into one command buffer
pub struct CommandRecorder {
    device: Device,
    command_buffer: vk::CommandBuffer,
    recording: bool,
}

impl CommandRecorder {
    /// Wrap an allocated command buffer
    pub fn new(device: Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
            recording: false,
        }
    }

    /// Begin recording; empty flags allow the buffer to be resubmitted
    pub fn begin(&mut self, flags: vk::CommandBufferUsageFlags) -> VulkanResult<&mut Self> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe {
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        self.recording = true;
        Ok(self)
    }

    /// Reset the buffer to the initial state so it can be recorded again
    pub fn reset(&mut self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
        }
        self.recording = false;
        Ok(())
    }

    /// Begin an inline render pass; it ends when the returned guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_>> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        Ok(ActiveRenderPass { recorder: self })
    }

    /// Finish recording
    pub fn end(&mut self) -> VulkanResult<vk::CommandBuffer> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
        }

        self.recording = false;
        Ok(self.command_buffer)
    }

    /// Underlying command buffer
    pub fn handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}

/// Open render pass scope
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl ActiveRenderPass<'_> {
    fn device(&self) -> &Device {
        &self.recorder.device
    }

    fn cb(&self) -> vk::CommandBuffer {
        self.recorder.command_buffer
    }

    /// Bind a graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device()
                .cmd_bind_pipeline(self.cb(), vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    /// Set the dynamic viewport to cover `extent`
    pub fn set_viewport(&mut self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        unsafe {
            self.device().cmd_set_viewport(self.cb(), 0, &[viewport]);
        }
    }

    /// Set the dynamic scissor to cover `extent`
    pub fn set_scissor(&mut self, extent: vk::Extent2D) {
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            self.device().cmd_set_scissor(self.cb(), 0, &[scissor]);
        }
    }

    /// Bind vertex buffers starting at binding 0
    pub fn bind_vertex_buffers(&mut self, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe {
            self.device().cmd_bind_vertex_buffers(self.cb(), 0, buffers, offsets);
        }
    }

    /// Bind an index buffer
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer, index_type: vk::IndexType) {
        unsafe {
            self.device().cmd_bind_index_buffer(self.cb(), buffer, 0, index_type);
        }
    }

    /// Bind descriptor sets starting at set 0
    pub fn bind_descriptor_sets(&mut self, layout: vk::PipelineLayout, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                self.cb(),
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                sets,
                &[],
            );
        }
    }

    /// Push constants to shaders
    pub fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, data: &[u8]) {
        unsafe {
            self.device().cmd_push_constants(self.cb(), layout, stages, 0, data);
        }
    }

    /// Non-indexed draw of a single instance
    pub fn draw(&mut self, vertex_count: u32) {
        unsafe {
            self.device().cmd_draw(self.cb(), vertex_count, 1, 0, 0);
        }
    }

    /// Indexed draw of a single instance
    pub fn draw_indexed(&mut self, index_count: u32) {
        unsafe {
            self.device().cmd_draw_indexed(self.cb(), index_count, 1, 0, 0, 0);
        }
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_values() {
        let color = color_clear([0.25, 0.5, 0.75, 1.0]);
        assert_eq!(unsafe { color.color.float32 }, [0.25, 0.5, 0.75, 1.0]);

        let depth = depth_clear(1.0);
        let value = unsafe { depth.depth_stencil };
        assert_eq!((value.depth, value.stencil), (1.0, 0));
    }
}
