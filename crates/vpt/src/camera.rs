//! Camera helpers producing the inverse model-view-projection renderers expect.
//!
//! The volume occupies the unit cube; cameras orbit its center.

use glam::{Mat4, Vec3};

/// Center of the unit-cube volume.
pub const VOLUME_CENTER: Vec3 = Vec3::splat(0.5);

/// Vertical field of view of [`orbit`], in radians.
pub const FOV_Y: f32 = std::f32::consts::FRAC_PI_4;

/// Inverse view-projection of a camera at `distance` from the volume center,
/// rotated by `yaw` around +Y and raised by `pitch`.
pub fn orbit(aspect: f32, yaw: f32, pitch: f32, distance: f32) -> Mat4 {
    let offset = Vec3::new(
        distance * pitch.cos() * yaw.sin(),
        distance * pitch.sin(),
        distance * pitch.cos() * yaw.cos(),
    );
    look_at(aspect, VOLUME_CENTER + offset, VOLUME_CENTER)
}

/// Inverse view-projection of a perspective camera at `eye` looking at `target`.
pub fn look_at(aspect: f32, eye: Vec3, target: Vec3) -> Mat4 {
    let view = Mat4::look_at_rh(eye, target, Vec3::Y);
    let projection = Mat4::perspective_rh(FOV_Y, aspect, 0.01, 100.0);
    (projection * view).inverse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn unproject(m: Mat4, ndc: Vec3) -> Vec3 {
        let p = m * Vec4::new(ndc.x, ndc.y, ndc.z, 1.0);
        p.truncate() / p.w
    }

    #[test]
    fn test_center_ray_hits_volume_center() {
        let inverse = orbit(1.0, 0.3, 0.2, 3.0);
        let near = unproject(inverse, Vec3::new(0.0, 0.0, 0.0));
        let far = unproject(inverse, Vec3::new(0.0, 0.0, 1.0));
        let direction = (far - near).normalize();
        let to_center = (VOLUME_CENTER - near).normalize();
        assert!(direction.dot(to_center) > 0.9999);
    }

    #[test]
    fn test_orbit_distance() {
        let inverse = orbit(1.5, 1.0, -0.4, 2.0);
        let eye = unproject(inverse, Vec3::new(0.0, 0.0, 0.0));
        // The near plane sits 0.01 in front of the eye.
        assert!((eye.distance(VOLUME_CENTER) - 1.99).abs() < 1e-3);
    }
}
