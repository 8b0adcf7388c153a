//! glTF mesh loading
//!
//! Reads the first primitive of the first mesh. Buffers are resolved from the
//! GLB blob, data URIs or files next to the document; images are not decoded.

use gltf::mesh::Mode;
use std::path::Path;

use crate::assets::{AssetError, MeshData};

/// Triangle primitive layouts a glTF primitive can use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangleTopology {
    /// Independent triangles
    List,
    /// Each vertex after the second forms a triangle with the previous two
    Strip,
    /// Each vertex after the second forms a triangle with the first and the previous one
    Fan,
}

impl TryFrom<Mode> for TriangleTopology {
    type Error = AssetError;

    fn try_from(mode: Mode) -> Result<Self, Self::Error> {
        match mode {
            Mode::Triangles => Ok(Self::List),
            Mode::TriangleStrip => Ok(Self::Strip),
            Mode::TriangleFan => Ok(Self::Fan),
            other => Err(AssetError::UnsupportedFormat(format!(
                "primitive mode {other:?} is not a triangle mode"
            ))),
        }
    }
}

/// Expand `indices` in `topology` into a triangle list with consistent winding
pub fn triangulate(indices: &[u32], topology: TriangleTopology) -> Vec<u32> {
    match topology {
        TriangleTopology::List => indices.chunks_exact(3).flatten().copied().collect(),
        TriangleTopology::Strip => indices
            .windows(3)
            .enumerate()
            .flat_map(|(i, w)| if i % 2 == 0 { [w[0], w[1], w[2]] } else { [w[1], w[0], w[2]] })
            .collect(),
        TriangleTopology::Fan => match indices.split_first() {
            Some((&first, rest)) => rest.windows(2).flat_map(|w| [first, w[0], w[1]]).collect(),
            None => Vec::new(),
        },
    }
}

/// Load positions and triangle-list indices from a `.gltf` or `.glb` file
pub fn load_gltf(path: &Path) -> Result<MeshData, AssetError> {
    let gltf::Gltf { document, blob } =
        gltf::Gltf::open(path).map_err(|e| AssetError::LoadFailed(format!("{}: {e}", path.display())))?;

    let buffers = gltf::import_buffers(&document, path.parent(), blob)
        .map_err(|e| AssetError::LoadFailed(format!("{}: buffers: {e}", path.display())))?;

    let mesh = document
        .meshes()
        .next()
        .ok_or_else(|| AssetError::InvalidData(format!("{} contains no meshes", path.display())))?;
    let primitive = mesh
        .primitives()
        .next()
        .ok_or_else(|| AssetError::InvalidData("mesh has no primitives".to_string()))?;

    let topology = TriangleTopology::try_from(primitive.mode())?;
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| AssetError::InvalidData("primitive has no POSITION attribute".to_string()))?
        .collect();

    let raw_indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    log::debug!(
        "glTF primitive: {} positions, {} indices, {:?}",
        positions.len(),
        raw_indices.len(),
        topology
    );

    Ok(MeshData {
        positions,
        indices: triangulate(&raw_indices, topology),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_drops_trailing_indices() {
        assert_eq!(
            triangulate(&[0, 1, 2, 3, 4, 5, 6], TriangleTopology::List),
            vec![0, 1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn test_strip_alternates_winding() {
        assert_eq!(
            triangulate(&[0, 1, 2, 3, 4], TriangleTopology::Strip),
            vec![0, 1, 2, 2, 1, 3, 2, 3, 4]
        );
        assert!(triangulate(&[0, 1], TriangleTopology::Strip).is_empty());
    }

    #[test]
    fn test_fan_shares_first_vertex() {
        assert_eq!(
            triangulate(&[0, 1, 2, 3], TriangleTopology::Fan),
            vec![0, 1, 2, 0, 2, 3]
        );
        assert!(triangulate(&[], TriangleTopology::Fan).is_empty());
    }

    #[test]
    fn test_non_triangle_modes_rejected() {
        assert!(TriangleTopology::try_from(Mode::Lines).is_err());
        assert_eq!(TriangleTopology::try_from(Mode::TriangleFan).unwrap(), TriangleTopology::Fan);
    }

    #[test]
    fn test_embedded_triangle() {
        // One triangle, positions in a base64 data URI, no indices
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let bytes: Vec<u8> = positions.iter().flatten().flat_map(|f| f.to_le_bytes()).collect();
        let uri = format!("data:application/octet-stream;base64,{}", base64_encode(&bytes));
        let document = format!(
            r#"{{
                "asset": {{"version": "2.0"}},
                "buffers": [{{"byteLength": 36, "uri": "{uri}"}}],
                "bufferViews": [{{"buffer": 0, "byteLength": 36}}],
                "accessors": [{{
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
                }}],
                "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}}}]}}]
            }}"#
        );

        let path = std::env::temp_dir().join(format!("valkeon_triangle_{}.gltf", std::process::id()));
        std::fs::write(&path, document).unwrap();
        let mesh = load_gltf(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(mesh.positions, positions.to_vec());
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    fn base64_encode(bytes: &[u8]) -> String {
        const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
        let mut out = String::new();
        for chunk in bytes.chunks(3) {
            let n = chunk.iter().enumerate().fold(0u32, |acc, (i, &b)| acc | u32::from(b) << (16 - 8 * i));
            for i in 0..4 {
                if i <= chunk.len() {
                    out.push(ALPHABET[(n >> (18 - 6 * i) & 63) as usize] as char);
                } else {
                    out.push('=');
                }
            }
        }
        out
    }
}
