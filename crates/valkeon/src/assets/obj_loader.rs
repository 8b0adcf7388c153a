//! OBJ file loader for 3D models
//!
//! Only `v` and `f` records are read. Face corners may be `v`, `v/vt`,
//! `v//vn` or `v/vt/vn`; indices are 1-based or negative (relative to the
//! vertices read so far). Polygons are fan-triangulated.

use std::path::Path;

use crate::assets::{AssetError, MeshData};

/// Load an OBJ file
pub fn load_obj(path: &Path) -> Result<MeshData, AssetError> {
    let text = std::fs::read_to_string(path)?;
    parse_obj(&text)
}

/// Parse OBJ text into positions and triangle-list indices
pub fn parse_obj(text: &str) -> Result<MeshData, AssetError> {
    let mut mesh = MeshData::default();

    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let coords: Vec<f32> = parts
                    .take(3)
                    .map(str::parse)
                    .collect::<Result<_, _>>()
                    .map_err(|e| parse_error(line_number, &format!("bad vertex coordinate: {e}")))?;
                let &[x, y, z] = coords.as_slice() else {
                    return Err(parse_error(line_number, "vertex needs three coordinates"));
                };
                mesh.positions.push([x, y, z]);
            }
            Some("f") => {
                let corners = parts
                    .map(|corner| resolve_index(corner, mesh.positions.len()))
                    .collect::<Result<Vec<u32>, String>>()
                    .map_err(|e| parse_error(line_number, &e))?;
                if corners.len() < 3 {
                    return Err(parse_error(line_number, "face needs at least three vertices"));
                }
                for pair in corners[1..].windows(2) {
                    mesh.indices.extend([corners[0], pair[0], pair[1]]);
                }
            }
            _ => {}
        }
    }

    Ok(mesh)
}

/// Zero-based position index of one face corner
fn resolve_index(corner: &str, vertex_count: usize) -> Result<u32, String> {
    let position = corner.split('/').next().unwrap_or_default();
    let index: i64 = position
        .parse()
        .map_err(|_| format!("bad face index '{corner}'"))?;

    let resolved = match index {
        0 => return Err("face index 0 is not valid".to_string()),
        i if i > 0 => i - 1,
        i => vertex_count as i64 + i,
    };

    if resolved < 0 || resolved >= vertex_count as i64 {
        return Err(format!("face index {index} out of range for {vertex_count} vertices"));
    }
    u32::try_from(resolved).map_err(|_| format!("face index {index} too large"))
}

fn parse_error(line_number: usize, message: &str) -> AssetError {
    AssetError::InvalidData(format!("line {}: {message}", line_number + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE_FACE: &str = "
        # one quad
        v -1.0 -1.0 0.0
        v  1.0 -1.0 0.0
        v  1.0  1.0 0.0
        v -1.0  1.0 0.0
        vn 0 0 1
        f 1/1/1 2/2/1 3/3/1 4/4/1
    ";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let mesh = parse_obj(CUBE_FACE).unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.positions[2], [1.0, 1.0, 0.0]);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_negative_indices() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_normal_only_corners() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1//1 2//1 3//1\n").unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_invalid_faces() {
        assert!(matches!(
            parse_obj("v 0 0 0\nf 1 2 3\n"),
            Err(AssetError::InvalidData(_))
        ));
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n").is_err());
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n").is_err());
        assert!(parse_obj("v 0 zero 0\n").is_err());
        assert!(parse_obj("v 0 0\n").is_err());
    }
}
