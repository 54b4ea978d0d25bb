//! Small vector helpers layered on top of `glam`'s double precision types.

use glam::{DQuat, DVec3};
use nalgebra::DVector;

/// Converts a rotation vector (axis scaled by angle) into a unit quaternion.
pub fn quat_from_rotation_vector(rotation: DVec3) -> DQuat {
    let angle = rotation.length();
    if angle < 1e-12 {
        return DQuat::IDENTITY;
    }
    DQuat::from_axis_angle(rotation / angle, angle)
}

/// Builds two unit tangents completing `normal` to a right-handed orthonormal frame.
pub fn tangent_basis(normal: DVec3) -> (DVec3, DVec3) {
    let helper = if normal.x.abs() < 0.57735 {
        DVec3::X
    } else if normal.y.abs() < 0.57735 {
        DVec3::Y
    } else {
        DVec3::Z
    };
    let t1 = normal.cross(helper).normalize();
    let t2 = normal.cross(t1);
    (t1, t2)
}

/// Copies a `DVec3` into `out[offset..offset + 3]`.
pub fn write_vec3(out: &mut DVector<f64>, offset: usize, v: DVec3) {
    out[offset] = v.x;
    out[offset + 1] = v.y;
    out[offset + 2] = v.z;
}

/// Reads `v[offset..offset + 3]` as a `DVec3`.
pub fn read_vec3(v: &DVector<f64>, offset: usize) -> DVec3 {
    DVec3::new(v[offset], v[offset + 1], v[offset + 2])
}
