//! Uniform buffer data.
//!
//! One [`UniformData`] instance lives in a host-visible buffer per swapchain
//! image and is rewritten every frame. The struct is `#[repr(C)]` with
//! `Pod`/`Zeroable` so it casts straight to bytes, and its layout matches
//! the vertex shader's binding 0 uniform block (three column-major mat4s).

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Model/view/projection matrices for one frame.
///
/// Total size: 3 x 64 = 192 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct UniformData {
    /// Model matrix (object to world space).
    pub model: Mat4,
    /// World-to-view transform.
    pub view: Mat4,
    /// Projection matrix (view to clip space), Y-flipped for Vulkan.
    pub proj: Mat4,
}

impl UniformData {
    /// Byte size of one instance, for uniform buffer allocation.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Computes the matrices for a point in time.
    ///
    /// The model spins about the Z axis at 90 degrees per second; the camera
    /// looks at the origin from (2, 2, 2) with +Z up; the projection is a
    /// 45-degree perspective over [0.1, 10]. GL-convention projections point
    /// clip-space Y up, Vulkan points it down, so the Y axis is negated.
    pub fn at_time(elapsed_secs: f32, aspect_ratio: f32) -> Self {
        let model = Mat4::from_rotation_z(elapsed_secs * 90.0f32.to_radians());
        let view = Mat4::look_at_rh(Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO, Vec3::Z);
        let mut proj = Mat4::perspective_rh(45.0f32.to_radians(), aspect_ratio, 0.1, 10.0);
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_and_alignment() {
        // 3 Mat4 = 192 bytes, Mat4 requires 16-byte alignment
        assert_eq!(UniformData::SIZE, 192);
        assert_eq!(std::mem::align_of::<UniformData>(), 16);
    }

    #[test]
    fn test_byte_cast() {
        let data = UniformData::at_time(1.0, 16.0 / 9.0);
        let bytes: &[u8] = bytemuck::bytes_of(&data);
        assert_eq!(bytes.len(), UniformData::SIZE);
    }

    #[test]
    fn test_projection_y_is_flipped() {
        let data = UniformData::at_time(0.0, 1.0);
        assert!(data.proj.y_axis.y < 0.0);
    }

    #[test]
    fn test_model_starts_at_identity() {
        let data = UniformData::at_time(0.0, 1.0);
        assert_eq!(data.model, Mat4::IDENTITY);
    }

    #[test]
    fn test_model_rotates_quarter_turn_per_second() {
        let data = UniformData::at_time(1.0, 1.0);
        let expected = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        assert!(
            data.model
                .to_cols_array()
                .iter()
                .zip(expected.to_cols_array().iter())
                .all(|(a, b)| (a - b).abs() < 1e-5)
        );
    }
}
