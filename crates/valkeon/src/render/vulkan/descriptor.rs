//! Descriptor set layouts, pools and image writes

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};
use crate::render::vulkan::texture::Texture;

/// Builder collecting bindings for a [`DescriptorSetLayout`]
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Start with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single combined image sampler at `binding`
    pub fn add_combined_image_sampler(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings added so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Create the layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
            bindings: self.bindings,
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Start building a layout
    pub fn builder() -> DescriptorSetLayoutBuilder {
        DescriptorSetLayoutBuilder::new()
    }

    /// Layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Bindings the layout was created with
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sizes that fit `max_sets` sets of `bindings`, one entry per descriptor type
pub fn pool_sizes(bindings: &[vk::DescriptorSetLayoutBinding], max_sets: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        let count = binding.descriptor_count * max_sets;
        match sizes.iter_mut().find(|size| size.ty == binding.descriptor_type) {
            Some(size) => size.descriptor_count += count,
            None => sizes.push(vk::DescriptorPoolSize {
                ty: binding.descriptor_type,
                descriptor_count: count,
            }),
        }
    }
    sizes
}

/// Descriptor pool sized for one layout
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool able to hold `max_sets` sets of `layout`
    pub fn for_layout(device: &Device, layout: &DescriptorSetLayout, max_sets: u32) -> VulkanResult<Self> {
        let sizes = pool_sizes(layout.bindings(), max_sets);
        if sizes.is_empty() || max_sets == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Descriptor pool would be empty".to_string(),
            });
        }

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            pool,
            device: device.clone(),
        })
    }

    /// Allocate one set per entry of `layouts`
    pub fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)
    }

    /// Point a combined image sampler binding of `set` at `texture`
    pub fn write_image(&self, set: vk::DescriptorSet, binding: u32, texture: &Texture) {
        let image_infos = [vk::DescriptorImageInfo {
            sampler: texture.sampler(),
            image_view: texture.image_view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];

        let write = vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos)
            .build();

        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }

    /// Pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            // Sets allocated from the pool are freed with it
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_sampler_binding() {
        let builder = DescriptorSetLayout::builder().add_combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT);
        let bindings = builder.bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_sizes_merge_types() {
        let builder = DescriptorSetLayoutBuilder::new()
            .add_combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT);

        let sizes = pool_sizes(builder.bindings(), 3);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[0].descriptor_count, 6);
        assert!(pool_sizes(&[], 3).is_empty());
    }
}
