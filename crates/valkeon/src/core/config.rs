//! # Application Configuration
//!
//! Everything a demo hard-codes can be overridden from a TOML or RON file:
//! window, renderer, shaders, camera and asset paths. Each demo has a preset
//! reproducing its built-in values.
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Upper bound on frames in flight
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 8;

/// Directories searched, in order, for compiled shaders
pub const SHADER_SEARCH_DIRS: [&str; 6] = [
    "target/shaders/",
    "shaders/",
    "resources/shaders/",
    "../target/shaders/",
    "../../target/shaders/",
    "./",
];

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl WindowConfig {
    /// Fixed-size window
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            resizable: false,
        }
    }

    /// Allow resizing
    pub fn resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new("Valkeon", 800, 600)
    }
}

/// Instance and frame pacing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the driver
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Validation layers on or off; `None` enables them in debug builds only
    pub enable_validation: Option<bool>,
    /// Frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,
    /// RGBA clear color of the color attachment
    pub clear_color: [f32; 4],
}

impl RendererConfig {
    /// Renderer settings with default pacing and a black clear color
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            application_version: (1, 0, 0),
            enable_validation: None,
            max_frames_in_flight: 2,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Set the clear color
    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the renderer section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }
        if self.max_frames_in_flight == 0 || self.max_frames_in_flight > MAX_FRAMES_IN_FLIGHT_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "Max frames in flight must be between 1 and {MAX_FRAMES_IN_FLIGHT_LIMIT}, got {}",
                self.max_frames_in_flight
            )));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Valkeon")
    }
}

/// Compiled shader locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Shader paths used as given
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Look each file name up in [`SHADER_SEARCH_DIRS`], falling back to `target/shaders/`
    ///
    /// Lets the demos run from the workspace root or from a crate directory.
    pub fn with_path_resolution(vertex_file: &str, fragment_file: &str) -> Self {
        Self {
            vertex_shader_path: resolve_in(&SHADER_SEARCH_DIRS, vertex_file),
            fragment_shader_path: resolve_in(&SHADER_SEARCH_DIRS, fragment_file),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.vertex_shader_path, &self.fragment_shader_path] {
            if !Path::new(path).exists() {
                return Err(ConfigError::Invalid(format!("Shader not found: {path}")));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("triangle.vert.spv", "triangle.frag.spv")
    }
}

/// First `dir + file` that exists, else the first directory joined with `file`
pub fn resolve_in(dirs: &[&str], file: &str) -> String {
    dirs.iter()
        .map(|dir| format!("{dir}{file}"))
        .find(|candidate| Path::new(candidate).exists())
        .unwrap_or_else(|| format!("{}{file}", dirs.first().copied().unwrap_or_default()))
}

/// Fixed camera for the model demo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Eye position in world space
    pub eye: [f32; 3],
    /// Viewing direction
    pub direction: [f32; 3],
    /// Up vector
    pub up: [f32; 3],
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl CameraConfig {
    /// Validate the projection parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.near <= 0.0 || self.far <= self.near {
            return Err(ConfigError::Invalid(format!(
                "Clip planes must satisfy 0 < near < far, got near {} far {}",
                self.near, self.far
            )));
        }
        if self.fov_y_degrees <= 0.0 || self.fov_y_degrees >= 180.0 {
            return Err(ConfigError::Invalid(format!(
                "Field of view must be between 0 and 180 degrees, got {}",
                self.fov_y_degrees
            )));
        }
        if self.direction.iter().all(|c| *c == 0.0) || self.up.iter().all(|c| *c == 0.0) {
            return Err(ConfigError::Invalid("Camera direction and up must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Vertical field of view in radians
    pub fn fov_y_radians(&self) -> f32 {
        self.fov_y_degrees.to_radians()
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: [0.0, 0.0, 3.0],
            direction: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 10.0,
        }
    }
}

/// Asset paths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Mesh file (`.gltf`, `.glb` or `.obj`)
    pub model_path: Option<String>,
    /// Texture image file
    pub texture_path: Option<String>,
    /// Reject the configuration when `model_path` is missing
    pub model_required: bool,
    /// Reject the configuration when `texture_path` is missing
    pub texture_required: bool,
}

/// # Complete Application Configuration
///
/// Top-level configuration handed to each demo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Shader paths
    pub shaders: ShaderConfig,
    /// Camera parameters
    pub camera: CameraConfig,
    /// Asset paths
    pub assets: AssetConfig,
}

impl ApplicationConfig {
    /// 800x600 fixed window drawing one colored triangle
    pub fn hello_triangle() -> Self {
        Self {
            window: WindowConfig::new("Hello Triangle", 800, 600),
            renderer: RendererConfig::new("Hello Triangle"),
            shaders: ShaderConfig::with_path_resolution("triangle.vert.spv", "triangle.frag.spv"),
            ..Self::default()
        }
    }

    /// 800x600 fixed window drawing the rubber duck with depth testing
    pub fn model_loading() -> Self {
        Self {
            window: WindowConfig::new("Model Loading", 800, 600),
            renderer: RendererConfig::new("Model Loading"),
            shaders: ShaderConfig::with_path_resolution("rubberduck.vert.spv", "rubberduck.frag.spv"),
            camera: CameraConfig::default(),
            assets: AssetConfig {
                model_path: Some("Assets/rubber_duck/scene.gltf".to_string()),
                model_required: true,
                ..AssetConfig::default()
            },
        }
    }

    /// Resizable window drawing a rotating textured quad on white
    pub fn quad_texture() -> Self {
        Self {
            window: WindowConfig::new("Quad Texture", 800, 600).resizable(true),
            renderer: RendererConfig::new("Quad Texture").with_clear_color([1.0, 1.0, 1.0, 1.0]),
            shaders: ShaderConfig::with_path_resolution("quad.vert.spv", "quad.frag.spv"),
            assets: AssetConfig {
                texture_path: Some("data/wood.jpg".to_string()),
                texture_required: true,
                ..AssetConfig::default()
            },
            ..Self::default()
        }
    }

    /// Layer `path` over `preset` when given, otherwise use `preset` as is;
    /// the result is validated
    pub fn load_or(path: Option<&str>, preset: impl FnOnce() -> Self) -> Result<Self, ConfigError> {
        let preset = preset();
        let config = match path {
            Some(path) => Self::load_over_file(path, &preset)?,
            None => preset,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.title.is_empty() {
            return Err(ConfigError::Invalid("Window title cannot be empty".to_string()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        self.renderer.validate()?;
        self.camera.validate()?;
        if self.assets.model_required {
            self.require_model_path()?;
        }
        if self.assets.texture_required {
            self.require_texture_path()?;
        }
        Ok(())
    }

    /// Model path, required by the model demo
    pub fn require_model_path(&self) -> Result<&str, ConfigError> {
        self.assets
            .model_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .ok_or_else(|| ConfigError::Invalid("assets.model_path is required".to_string()))
    }

    /// Texture path, required by the quad demo
    pub fn require_texture_path(&self) -> Result<&str, ConfigError> {
        self.assets
            .texture_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .ok_or_else(|| ConfigError::Invalid("assets.texture_path is required".to_string()))
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_presets_are_valid() {
        for config in [
            ApplicationConfig::hello_triangle(),
            ApplicationConfig::model_loading(),
            ApplicationConfig::quad_texture(),
        ] {
            assert!(config.validate().is_ok(), "{} preset invalid", config.window.title);
        }
    }

    #[test]
    fn test_preset_values() {
        let triangle = ApplicationConfig::hello_triangle();
        assert_eq!((triangle.window.width, triangle.window.height), (800, 600));
        assert!(!triangle.window.resizable);
        assert_eq!(triangle.renderer.max_frames_in_flight, 2);

        let quad = ApplicationConfig::quad_texture();
        assert!(quad.window.resizable);
        assert_eq!(quad.renderer.clear_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(quad.require_texture_path().unwrap(), "data/wood.jpg");
        assert!(quad.require_model_path().is_err());

        let model = ApplicationConfig::model_loading();
        assert_eq!(model.require_model_path().unwrap(), "Assets/rubber_duck/scene.gltf");
        assert!(model.shaders.vertex_shader_path.ends_with("rubberduck.vert.spv"));
    }

    #[test]
    fn test_rejects_bad_window_and_frames() {
        let mut config = ApplicationConfig::hello_triangle();
        config.window.width = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ApplicationConfig::hello_triangle();
        config.window.title.clear();
        assert!(config.validate().is_err());

        let mut config = ApplicationConfig::hello_triangle();
        config.renderer.max_frames_in_flight = 0;
        assert!(config.validate().is_err());
        config.renderer.max_frames_in_flight = 9;
        assert!(config.validate().is_err());
        config.renderer.max_frames_in_flight = 8;
        assert!(config.validate().is_ok());

        let mut config = ApplicationConfig::hello_triangle();
        config.renderer.application_name.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_camera() {
        let mut camera = CameraConfig::default();
        camera.near = 0.0;
        assert!(camera.validate().is_err());

        let mut camera = CameraConfig::default();
        camera.far = camera.near;
        assert!(camera.validate().is_err());

        let mut camera = CameraConfig::default();
        camera.fov_y_degrees = 180.0;
        assert!(camera.validate().is_err());

        assert!(CameraConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_override() {
        assert!(RendererConfig::default().with_validation(true).validation_enabled());
        assert!(!RendererConfig::default().with_validation(false).validation_enabled());
        assert_eq!(RendererConfig::default().validation_enabled(), cfg!(debug_assertions));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            [window]
            title = "Custom"
            resizable = true

            [assets]
            texture_path = "textures/brick.png"
        "#;
        let config: ApplicationConfig = ConfigFormat::Toml.parse(text).unwrap();
        assert_eq!(config.window.title, "Custom");
        assert_eq!(config.window.width, 800);
        assert!(config.window.resizable);
        assert_eq!(config.renderer, RendererConfig::default());
        assert_eq!(config.require_texture_path().unwrap(), "textures/brick.png");
        assert_eq!(config.assets.model_path, None);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("valkeon_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let original = ApplicationConfig::quad_texture();
        for name in ["quad.toml", "quad.ron"] {
            let path = dir.join(name);
            original.save_to_file(&path).unwrap();
            let loaded = ApplicationConfig::load_from_file(&path).unwrap();
            assert_eq!(loaded, original);
        }

        assert!(matches!(
            original.save_to_file(dir.join("quad.yaml")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sample_configs_load() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../resources/config");
        let path = |name: &str| dir.join(name).to_string_lossy().into_owned();

        let triangle =
            ApplicationConfig::load_or(Some(&path("hello_triangle.toml")), ApplicationConfig::hello_triangle).unwrap();
        assert_eq!(triangle.renderer.enable_validation, Some(true));

        let model =
            ApplicationConfig::load_or(Some(&path("model_loading.ron")), ApplicationConfig::model_loading).unwrap();
        assert_eq!(model.window.width, 1024);
        assert_eq!(model.camera.eye, [0.0, 1.0, 3.0]);
        assert!(model.assets.model_required);

        let quad =
            ApplicationConfig::load_or(Some(&path("quad_texture.toml")), ApplicationConfig::quad_texture).unwrap();
        assert_eq!(quad.window.height, 600);
        assert_eq!(quad.renderer.max_frames_in_flight, 3);
        assert_eq!(quad.require_texture_path().unwrap(), "data/wood.jpg");
    }

    #[test]
    fn test_load_or_keeps_preset_values_the_file_omits() {
        let dir = std::env::temp_dir().join(format!("valkeon_overrides_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let camera_only = dir.join("camera.toml");
        std::fs::write(&camera_only, "[camera]\neye = [0.0, 2.0, 5.0]\n").unwrap();
        let model = ApplicationConfig::load_or(camera_only.to_str(), ApplicationConfig::model_loading).unwrap();
        assert_eq!(model.camera.eye, [0.0, 2.0, 5.0]);
        assert_eq!(model.camera.direction, CameraConfig::default().direction);
        assert_eq!(model.shaders, ApplicationConfig::model_loading().shaders);
        assert_eq!(model.require_model_path().unwrap(), "Assets/rubber_duck/scene.gltf");
        assert_eq!(model.window.title, "Model Loading");

        let width_only = dir.join("width.ron");
        std::fs::write(&width_only, "(window: (width: 640))").unwrap();
        let quad = ApplicationConfig::load_or(width_only.to_str(), ApplicationConfig::quad_texture).unwrap();
        assert_eq!((quad.window.width, quad.window.height), (640, 600));
        assert!(quad.window.resizable);
        assert_eq!(quad.renderer.clear_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(quad.require_texture_path().unwrap(), "data/wood.jpg");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_required_assets_are_validated() {
        let mut model = ApplicationConfig::model_loading();
        model.assets.model_path = None;
        assert!(matches!(model.validate(), Err(ConfigError::Invalid(_))));
        model.assets.model_path = Some(String::new());
        assert!(model.validate().is_err());

        let mut quad = ApplicationConfig::quad_texture();
        quad.assets.texture_path = None;
        assert!(matches!(quad.validate(), Err(ConfigError::Invalid(_))));

        let mut triangle = ApplicationConfig::hello_triangle();
        triangle.assets.texture_path = None;
        assert!(triangle.validate().is_ok());
    }

    #[test]
    fn test_shader_resolution_falls_back() {
        let path = resolve_in(&["no/such/dir/", "also/missing/"], "x.spv");
        assert_eq!(path, "no/such/dir/x.spv");
        assert_eq!(resolve_in(&[], "x.spv"), "x.spv");
    }
}
