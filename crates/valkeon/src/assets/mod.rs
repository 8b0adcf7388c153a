//! Asset loading
//!
//! Decodes the files the demos draw: a mesh (glTF or OBJ) reduced to positions
//! and a triangle-list index buffer, and images converted to RGBA8.

pub mod gltf_loader;
pub mod image_loader;
pub mod obj_loader;

pub use image_loader::ImageData;

use std::path::Path;
use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unsupported asset format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Indexed triangle-list mesh with positions only
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Triangle-list indices into `positions`
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Check that the mesh is drawable as an indexed triangle list
    pub fn validate(&self) -> Result<(), AssetError> {
        if self.positions.is_empty() {
            return Err(AssetError::InvalidData("mesh has no positions".to_string()));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(AssetError::InvalidData(format!(
                "index count {} is not a positive multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.positions.len();
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(AssetError::InvalidData(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }
        Ok(())
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Load a mesh, choosing the decoder from the file extension
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<MeshData, AssetError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AssetError::NotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let mesh = match extension.as_deref() {
        Some("gltf" | "glb") => gltf_loader::load_gltf(path)?,
        Some("obj") => obj_loader::load_obj(path)?,
        _ => return Err(AssetError::UnsupportedFormat(path.display().to_string())),
    };
    mesh.validate()?;

    log::info!(
        "Loaded model {} ({} vertices, {} triangles)",
        path.display(),
        mesh.positions.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        MeshData {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_validate_accepts_triangle() {
        assert!(triangle().validate().is_ok());
        assert_eq!(triangle().triangle_count(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_meshes() {
        let mut out_of_range = triangle();
        out_of_range.indices[2] = 3;
        assert!(matches!(out_of_range.validate(), Err(AssetError::InvalidData(_))));

        let mut ragged = triangle();
        ragged.indices.push(0);
        assert!(ragged.validate().is_err());

        assert!(MeshData::default().validate().is_err());
    }

    #[test]
    fn test_load_model_dispatch_errors() {
        assert!(matches!(
            load_model("missing/duck.gltf"),
            Err(AssetError::NotFound(_))
        ));
        assert!(matches!(
            load_model("Cargo.toml"),
            Err(AssetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_obj_from_disk() {
        let path = std::env::temp_dir().join(format!("valkeon_quad_{}.obj", std::process::id()));
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap();

        let mesh = load_model(&path).unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        std::fs::remove_file(&path).ok();
    }
}
