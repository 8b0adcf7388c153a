//! Vertex input layouts for the demo meshes
//!
//! Each vertex type describes its own binding and attributes so a pipeline
//! can be built from the type alone.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem::{offset_of, size_of};

/// A vertex type that can describe itself to the pipeline's vertex input stage
pub trait VertexLayout: Pod {
    /// Binding 0, per-vertex rate, stride of `Self`
    fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// One entry per shader input location
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription>;
}

/// 2D position with a per-vertex color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    /// Clip-space position
    pub pos: [f32; 2],
    /// Linear RGB color
    pub color: [f32; 3],
}

impl VertexLayout for ColorVertex {
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Self, pos) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Self, color) as u32,
            },
        ]
    }
}

/// Position-only vertex used for loaded meshes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    /// Model-space position
    pub pos: [f32; 3],
}

impl VertexLayout for PositionVertex {
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![vk::VertexInputAttributeDescription {
            binding: 0,
            location: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        }]
    }
}

impl From<[f32; 3]> for PositionVertex {
    fn from(pos: [f32; 3]) -> Self {
        Self { pos }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_vertex_layout() {
        let binding = ColorVertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 20);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);

        let attributes = ColorVertex::attribute_descriptions();
        assert_eq!(attributes.len(), 2);
        assert_eq!((attributes[0].location, attributes[0].offset), (0, 0));
        assert_eq!((attributes[1].location, attributes[1].offset), (1, 8));
        assert_eq!(attributes[1].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn test_position_vertex_layout() {
        assert_eq!(PositionVertex::binding_description().stride, 12);
        let attributes = PositionVertex::attribute_descriptions();
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn test_vertices_cast_to_bytes() {
        let vertices = [
            PositionVertex::from([0.0, 1.0, 2.0]),
            PositionVertex::from([3.0, 4.0, 5.0]),
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[12..16], &3.0f32.to_ne_bytes());
    }
}
