//! Frames in flight
//!
//! Each frame: wait on the frame's fence, acquire an image, reset the fence,
//! submit the recorded work, present, and advance to the next frame slot.
//! The fence is reset only after an image was acquired, so an out-of-date
//! swapchain never leaves the slot with an unsignaled fence nobody will signal.

use ash::prelude::VkResult;
use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::render::vulkan::swapchain::Swapchain;
use crate::render::vulkan::sync::FrameSync;

/// Frames the CPU may record ahead of the GPU unless configured otherwise
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// What happened to one call of [`FrameLoop::draw_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The image was rendered and queued for presentation
    Presented {
        /// Swapchain image that was drawn
        image_index: u32,
    },
    /// The image was presented but the swapchain no longer matches the surface
    Suboptimal {
        /// Swapchain image that was drawn
        image_index: u32,
    },
    /// No image could be acquired; nothing was submitted
    OutOfDate,
}

impl FrameStatus {
    /// Whether the swapchain should be rebuilt before the next frame
    pub fn needs_recreate(self) -> bool {
        !matches!(self, Self::Presented { .. })
    }
}

/// Result of `vkAcquireNextImageKHR` reduced to what the loop acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available
    Ready {
        /// Acquired image index
        image_index: u32,
        /// The driver reported SUBOPTIMAL_KHR
        suboptimal: bool,
    },
    /// ERROR_OUT_OF_DATE_KHR
    OutOfDate,
}

/// Map an acquire result; errors other than out-of-date are fatal
pub fn classify_acquire(result: VkResult<(u32, bool)>) -> VulkanResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready { image_index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// Map a present result to "swapchain still matches" (`true`) or not;
/// errors other than out-of-date are fatal
pub fn classify_present(result: VkResult<bool>) -> VulkanResult<bool> {
    match result {
        Ok(suboptimal) => Ok(!suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// Slot that follows `current` in a ring of `frames_in_flight`
pub fn next_frame_index(current: usize, frames_in_flight: usize) -> usize {
    (current + 1) % frames_in_flight
}

/// Per-frame synchronization plus the acquire/submit/present sequence
pub struct FrameLoop {
    frames: Vec<FrameSync>,
    // Frame slot whose fence guards each swapchain image's last submission
    images_in_flight: Vec<Option<usize>>,
    current_frame: usize,
}

impl FrameLoop {
    /// Create synchronization objects for `frames_in_flight` frames
    pub fn new(device: &Device, frames_in_flight: usize) -> VulkanResult<Self> {
        if frames_in_flight == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "At least one frame in flight is required".to_string(),
            });
        }

        let frames = (0..frames_in_flight)
            .map(|_| FrameSync::new(device))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::info!("Synchronization objects created for {} frames in flight", frames_in_flight);

        Ok(Self {
            frames,
            images_in_flight: Vec::new(),
            current_frame: 0,
        })
    }

    /// Slot the next call to [`FrameLoop::draw_frame`] will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Forget image ownership after the swapchain was rebuilt
    pub fn reset_images(&mut self) {
        self.images_in_flight.clear();
    }

    /// Render and present one frame
    ///
    /// `record` receives the acquired image index and the frame slot, and
    /// returns the command buffer to submit.
    pub fn draw_frame<F>(&mut self, ctx: &VulkanContext, swapchain: &Swapchain, record: F) -> VulkanResult<FrameStatus>
    where
        F: FnOnce(u32, usize) -> VulkanResult<vk::CommandBuffer>,
    {
        let frame_index = self.current_frame;
        let frame = &self.frames[frame_index];

        frame.in_flight.wait(u64::MAX)?;

        let acquire = unsafe {
            swapchain.loader().acquire_next_image(
                swapchain.handle(),
                u64::MAX,
                frame.image_available.handle(),
                vk::Fence::null(),
            )
        };
        let (image_index, acquire_suboptimal) = match classify_acquire(acquire)? {
            AcquireOutcome::Ready { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire; frame skipped");
                return Ok(FrameStatus::OutOfDate);
            }
        };

        // An earlier slot may still be rendering into this image
        if self.images_in_flight.len() != swapchain.image_count() {
            self.images_in_flight = vec![None; swapchain.image_count()];
        }
        if let Some(owner) = self.images_in_flight[image_index as usize] {
            if owner != frame_index {
                self.frames[owner].in_flight.wait(u64::MAX)?;
            }
        }
        self.images_in_flight[image_index as usize] = Some(frame_index);

        let command_buffer = record(image_index, frame_index)?;

        let frame = &self.frames[frame_index];
        frame.in_flight.reset()?;

        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_finished.handle()];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            ctx.device()
                .queue_submit(ctx.graphics_queue(), &[submit_info], frame.in_flight.handle())
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present = unsafe { swapchain.loader().queue_present(ctx.present_queue(), &present_info) };
        let still_optimal = classify_present(present)?;

        self.current_frame = next_frame_index(frame_index, self.frames.len());

        if still_optimal && !acquire_suboptimal {
            Ok(FrameStatus::Presented { image_index })
        } else {
            Ok(FrameStatus::Suboptimal { image_index })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_wraps() {
        let mut index = 0;
        let visited: Vec<usize> = (0..5)
            .map(|_| {
                let current = index;
                index = next_frame_index(index, DEFAULT_FRAMES_IN_FLIGHT);
                current
            })
            .collect();
        assert_eq!(visited, vec![0, 1, 0, 1, 0]);
        assert_eq!(next_frame_index(0, 1), 0);
        assert_eq!(next_frame_index(2, 3), 0);
    }

    #[test]
    fn test_acquire_classification() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 2,
                suboptimal: false
            }
        );
        assert_eq!(
            classify_acquire(Ok((1, true))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 1,
                suboptimal: true
            }
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn test_present_classification() {
        assert!(classify_present(Ok(false)).unwrap());
        assert!(!classify_present(Ok(true)).unwrap());
        assert!(!classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap());
        assert!(classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }

    #[test]
    fn test_status_recreate_flag() {
        assert!(!FrameStatus::Presented { image_index: 0 }.needs_recreate());
        assert!(FrameStatus::Suboptimal { image_index: 0 }.needs_recreate());
        assert!(FrameStatus::OutOfDate.needs_recreate());
    }
}
