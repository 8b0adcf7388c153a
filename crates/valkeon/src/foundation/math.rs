//! Math utilities and types
//!
//! Projection helpers follow OpenGL conventions with the Y axis flipped for
//! Vulkan's downward clip-space Y.

use ash::vk;
pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Right-handed perspective projection with clip-space Y pointing down
pub fn perspective_vk(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut projection = Mat4::new_perspective(aspect, fov_y, near, far);
    projection[(1, 1)] *= -1.0;
    projection
}

/// View matrix for a camera at `eye` looking along `direction`
pub fn look_at(eye: &Vec3, direction: &Vec3, up: &Vec3) -> Mat4 {
    let eye = Point3::from(*eye);
    Mat4::look_at_rh(&eye, &(eye + *direction), up)
}

/// Orthographic projection of the given box
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::new_orthographic(left, right, bottom, top, near, far)
}

/// Rotation by `angle` radians around +Z
pub fn rotation_z(angle: f32) -> Mat4 {
    Mat4::from_axis_angle(&Vec3::z_axis(), angle)
}

/// Width over height; 1.0 for a degenerate extent
pub fn aspect_ratio(extent: vk::Extent2D) -> f32 {
    if extent.height == 0 {
        return 1.0;
    }
    extent.width as f32 / extent.height as f32
}

/// Column-major bytes of `matrix`, as GLSL reads a `mat4` push constant
pub fn mat4_bytes(matrix: &Mat4) -> &[u8] {
    bytemuck::cast_slice(matrix.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn ndc(m: &Mat4, p: [f32; 3]) -> Vec3 {
        let clip = m * Vec4::new(p[0], p[1], p[2], 1.0);
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn test_perspective_flips_y() {
        let projection = perspective_vk(FRAC_PI_2, 1.0, 0.1, 10.0);
        let top = ndc(&projection, [0.0, 1.0, -1.0]);
        assert_relative_eq!(top.y, -1.0, epsilon = 1e-5);

        let wide = perspective_vk(FRAC_PI_2, 2.0, 0.1, 10.0);
        let right = ndc(&wide, [1.0, 0.0, -1.0]);
        assert_relative_eq!(right.x, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_moves_world_in_front_of_camera() {
        let view = look_at(&Vec3::new(0.0, 0.0, 3.0), &Vec3::new(0.0, 0.0, -1.0), &Vec3::y());
        let origin = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.z, -3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_quad_ortho_and_rotation() {
        let ratio = 2.0;
        let projection = ortho(-ratio, ratio, -1.0, 1.0, 1.0, -1.0);
        let corner = ndc(&projection, [2.0, 1.0, 0.0]);
        assert_relative_eq!(corner.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(corner.y, 1.0, epsilon = 1e-5);

        let quarter = rotation_z(FRAC_PI_2) * Vec4::new(1.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(quarter.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(quarter.y, 1.0, epsilon = 1e-5);

        let half = rotation_z(PI) * Vec4::new(0.0, 1.0, 0.0, 0.0);
        assert_relative_eq!(half.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_aspect_ratio() {
        let extent = |width, height| vk::Extent2D { width, height };
        assert_relative_eq!(aspect_ratio(extent(800, 600)), 4.0 / 3.0);
        assert_relative_eq!(aspect_ratio(extent(600, 800)), 0.75);
        assert_relative_eq!(aspect_ratio(extent(800, 0)), 1.0);
    }

    #[test]
    fn test_mat4_bytes_column_major() {
        #[rustfmt::skip]
        let m = Mat4::new(
            1.0, 2.0, 3.0, 4.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0,
            13.0, 14.0, 15.0, 16.0,
        );
        let bytes = mat4_bytes(&m);
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &5.0f32.to_ne_bytes());
        assert_eq!(&bytes[16..20], &2.0f32.to_ne_bytes());
    }
}
