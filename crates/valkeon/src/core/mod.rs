//! Shared application configuration

pub mod config;

pub use config::{
    ApplicationConfig, AssetConfig, CameraConfig, Config, ConfigError, RendererConfig, ShaderConfig, WindowConfig,
};
