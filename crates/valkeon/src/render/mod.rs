//! Rendering

pub mod vulkan;
