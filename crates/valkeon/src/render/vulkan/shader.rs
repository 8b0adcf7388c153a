//! Shader modules and graphics pipelines
//!
//! SPIR-V loading plus a descriptor-driven pipeline builder covering the
//! handful of fixed-function variations the demos need.

use ash::{vk, Device};
use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

use crate::render::vulkan::context::{VulkanError, VulkanResult};
use crate::render::vulkan::vertex_layout::{PositionVertex, VertexLayout};

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// SPIR-V magic number in host byte order
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Size in bytes of a `mat4` push constant
pub const MAT4_PUSH_CONSTANT_SIZE: u32 = 64;

/// Decode SPIR-V bytes into words, accepting either endianness
pub fn spirv_words(bytes: &[u8]) -> VulkanResult<Vec<u32>> {
    if bytes.is_empty() {
        return Err(VulkanError::InvalidSpirv("empty module".to_string()));
    }
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| VulkanError::InvalidSpirv(e.to_string()))
}

/// Read a compiled shader from disk
pub fn read_spirv<P: AsRef<Path>>(path: P) -> VulkanResult<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| VulkanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    spirv_words(&bytes)
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V words
    pub fn from_words(device: Device, words: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);

        let module = unsafe { device.create_shader_module(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Self { device, module })
    }

    /// Load a shader from a SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let words = read_spirv(path)?;
        log::debug!("Loaded shader {} ({} words)", path.display(), words.len());
        Self::from_words(device, &words)
    }

    /// Shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Everything that varies between the demo pipelines
pub struct PipelineDesc<'a> {
    /// Vertex stage
    pub vertex_shader: &'a ShaderModule,
    /// Fragment stage
    pub fragment_shader: &'a ShaderModule,
    /// Vertex buffer bindings; empty when the shader generates its vertices
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attributes
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
    /// Winding treated as front-facing
    pub front_face: vk::FrontFace,
    /// Depth test and write with LESS
    pub depth_test: bool,
    /// Viewport and scissor are set while recording instead of baked in
    pub dynamic_viewport: bool,
    /// Push constant ranges of the layout
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    /// Descriptor set layouts of the layout, in set order
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Baked viewport size when not dynamic
    pub extent: vk::Extent2D,
}

impl<'a> PipelineDesc<'a> {
    /// Triangle list, no culling, clockwise front faces, no depth, no push constants
    pub fn basic(vertex_shader: &'a ShaderModule, fragment_shader: &'a ShaderModule, extent: vk::Extent2D) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: false,
            dynamic_viewport: false,
            push_constant_ranges: Vec::new(),
            set_layouts: Vec::new(),
            extent,
        }
    }

    /// Position-only vertices, a vertex-stage `mat4` push constant and depth testing
    pub fn with_mvp(vertex_shader: &'a ShaderModule, fragment_shader: &'a ShaderModule, extent: vk::Extent2D) -> Self {
        let mut desc = Self::basic(vertex_shader, fragment_shader, extent)
            .vertex_layout::<PositionVertex>()
            .push_constant(vk::ShaderStageFlags::VERTEX, MAT4_PUSH_CONSTANT_SIZE);
        desc.depth_test = true;
        desc
    }

    /// Take vertex input from `V`
    pub fn vertex_layout<V: VertexLayout>(mut self) -> Self {
        self.vertex_bindings = vec![V::binding_description()];
        self.vertex_attributes = V::attribute_descriptions();
        self
    }

    /// Set the primitive topology
    pub fn topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set culling and winding
    pub fn cull(mut self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) -> Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    /// Make viewport and scissor dynamic
    pub fn dynamic_viewport(mut self) -> Self {
        self.dynamic_viewport = true;
        self
    }

    /// Append a push constant range placed after the existing ones
    pub fn push_constant(mut self, stages: vk::ShaderStageFlags, size: u32) -> Self {
        let offset = self
            .push_constant_ranges
            .last()
            .map_or(0, |range| range.offset + range.size);
        self.push_constant_ranges.push(vk::PushConstantRange {
            stage_flags: stages,
            offset,
            size,
        });
        self
    }

    /// Append a descriptor set layout
    pub fn set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
        self.set_layouts.push(layout);
        self
    }

    /// Dynamic states implied by the descriptor
    pub fn dynamic_states(&self) -> Vec<vk::DynamicState> {
        if self.dynamic_viewport {
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        } else {
            Vec::new()
        }
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Build the layout and pipeline described by `desc` for subpass 0 of `render_pass`
    pub fn new(device: Device, render_pass: vk::RenderPass, desc: &PipelineDesc<'_>) -> VulkanResult<Self> {
        let shader_stages = [
            desc.vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
            desc.fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&desc.vertex_bindings)
            .vertex_attribute_descriptions(&desc.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(desc.topology)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: desc.extent.width as f32,
            height: desc.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: desc.extent,
        }];
        // Dynamic state still needs the counts
        let viewport_state = if desc.dynamic_viewport {
            vk::PipelineViewportStateCreateInfo::builder()
                .viewport_count(1)
                .scissor_count(1)
        } else {
            vk::PipelineViewportStateCreateInfo::builder()
                .viewports(&viewports)
                .scissors(&scissors)
        };

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(desc.cull_mode)
            .front_face(desc.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_test)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = desc.dynamic_states();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&desc.set_layouts)
            .push_constant_ranges(&desc.push_constant_ranges);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let created = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        };
        let pipeline = match created {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(e));
            }
        };
        let Some(pipeline) = pipeline else {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            return Err(VulkanError::InitializationFailed(
                "Driver returned no pipeline".to_string(),
            ));
        };

        log::info!(
            "Graphics pipeline created ({:?}, depth test {}, dynamic viewport {})",
            desc.topology,
            desc.depth_test,
            desc.dynamic_viewport
        );

        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_spirv_words_little_endian() {
        let bytes = module_bytes(&[SPIRV_MAGIC, 0x0001_0000, 7]);
        assert_eq!(spirv_words(&bytes).unwrap(), vec![SPIRV_MAGIC, 0x0001_0000, 7]);
    }

    #[test]
    fn test_spirv_words_big_endian_swapped() {
        let bytes: Vec<u8> = [SPIRV_MAGIC, 7].iter().flat_map(|w| w.to_be_bytes()).collect();
        assert_eq!(spirv_words(&bytes).unwrap(), vec![SPIRV_MAGIC, 7]);
    }

    #[test]
    fn test_spirv_rejects_misaligned_length() {
        let mut bytes = module_bytes(&[SPIRV_MAGIC, 1]);
        bytes.push(0);
        assert!(matches!(spirv_words(&bytes), Err(VulkanError::InvalidSpirv(_))));
        assert!(matches!(spirv_words(&[]), Err(VulkanError::InvalidSpirv(_))));
    }

    #[test]
    fn test_spirv_rejects_bad_magic() {
        let bytes = module_bytes(&[0xdead_beef, 1]);
        assert!(matches!(spirv_words(&bytes), Err(VulkanError::InvalidSpirv(_))));
    }

    #[test]
    fn test_spirv_read_from_disk() {
        let dir = std::env::temp_dir().join(format!("valkeon_spirv_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("module.spv");
        std::fs::write(&path, module_bytes(&[SPIRV_MAGIC, 0x0001_0300, 11, 0])).unwrap();

        assert_eq!(read_spirv(&path).unwrap(), vec![SPIRV_MAGIC, 0x0001_0300, 11, 0]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_shader_is_io_error() {
        let result = read_spirv("definitely/not/here.spv");
        assert!(matches!(result, Err(VulkanError::Io { .. })));
    }
}
