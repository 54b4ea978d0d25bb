use super::types::{MassProperties, Transform, Velocity};
use crate::utils::math::{quat_from_rotation_vector, read_vec3, write_vec3};
use glam::{DMat3, DQuat, DVec3};
use nalgebra::{DMatrix, DVector, Matrix3};

/// Number of spatial (velocity) coordinates of a rigid body: linear then angular.
pub const RIGID_SPATIAL_DOFS: usize = 6;

/// Number of Euler (configuration) coordinates of a rigid body: position then quaternion xyzw.
pub const RIGID_EULER_DOFS: usize = 7;

/// Free rigid body with world-frame velocity.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub transform: Transform,
    pub velocity: Velocity,
    pub mass_properties: MassProperties,
    pub is_static: bool,
    pub inverse_mass: f64,
    /// Inverse inertia tensor in the body frame.
    pub inverse_inertia: DMat3,
    /// Set when a movable body's mass or inertia is not positive definite.
    singular: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        let mut body = Self {
            transform: Transform::default(),
            velocity: Velocity::default(),
            mass_properties: MassProperties::default(),
            is_static: false,
            inverse_mass: 1.0,
            inverse_inertia: DMat3::IDENTITY,
            singular: false,
        };
        body.recompute_inverses();
        body
    }
}

impl RigidBody {
    pub fn new(mass_properties: MassProperties) -> Self {
        let mut body = Self {
            mass_properties,
            ..Self::default()
        };
        body.recompute_inverses();
        body
    }

    /// Immovable body: zero inverse mass and inertia.
    pub fn fixed(transform: Transform) -> Self {
        Self {
            transform,
            is_static: true,
            inverse_mass: 0.0,
            inverse_inertia: DMat3::ZERO,
            singular: false,
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: DVec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_velocity(mut self, linear: DVec3, angular: DVec3) -> Self {
        self.set_velocity(linear, angular);
        self
    }

    pub fn set_velocity(&mut self, linear: DVec3, angular: DVec3) {
        self.velocity.linear = linear;
        self.velocity.angular = angular;
    }

    pub fn set_mass_properties(&mut self, props: MassProperties) {
        self.mass_properties = props;
        self.recompute_inverses();
    }

    fn recompute_inverses(&mut self) {
        self.singular = false;
        if self.is_static {
            self.inverse_mass = 0.0;
            self.inverse_inertia = DMat3::ZERO;
            return;
        }
        let mass = self.mass_properties.mass;
        let inverse_inertia = invert_inertia(self.mass_properties.inertia);
        self.singular = !(mass.is_finite() && mass > 0.0) || inverse_inertia.is_none();
        self.inverse_mass = if mass.is_finite() && mass > 0.0 { 1.0 / mass } else { 0.0 };
        self.inverse_inertia = inverse_inertia.unwrap_or(DMat3::ZERO);
    }

    /// True for a movable body whose mass or inertia cannot be inverted.
    pub fn has_singular_inertia(&self) -> bool {
        self.singular
    }

    /// Inverse inertia tensor rotated into the world frame.
    pub fn world_inverse_inertia(&self) -> DMat3 {
        let r = DMat3::from_quat(self.transform.rotation);
        r * self.inverse_inertia * r.transpose()
    }

    pub fn world_inertia(&self) -> DMat3 {
        let r = DMat3::from_quat(self.transform.rotation);
        r * self.mass_properties.inertia * r.transpose()
    }

    /// True when the body cannot be moved by impulses.
    pub fn is_immovable(&self) -> bool {
        self.is_static
    }

    pub fn point_velocity(&self, point: DVec3) -> DVec3 {
        self.velocity.linear + self.velocity.angular.cross(point - self.transform.position)
    }

    pub fn apply_impulse(&mut self, impulse: DVec3, point: DVec3) {
        if self.is_static {
            return;
        }
        self.velocity.linear += impulse * self.inverse_mass;
        let torque = (point - self.transform.position).cross(impulse);
        self.velocity.angular += self.world_inverse_inertia() * torque;
    }

    pub fn kinetic_energy(&self) -> f64 {
        if self.is_static {
            return 0.0;
        }
        let linear = 0.5 * self.mass_properties.mass * self.velocity.linear.length_squared();
        let angular = 0.5 * self.velocity.angular.dot(self.world_inertia() * self.velocity.angular);
        linear + angular
    }

    pub fn spatial_velocity(&self) -> DVector<f64> {
        let mut v = DVector::zeros(RIGID_SPATIAL_DOFS);
        write_vec3(&mut v, 0, self.velocity.linear);
        write_vec3(&mut v, 3, self.velocity.angular);
        v
    }

    pub fn set_spatial_velocity(&mut self, v: &DVector<f64>) {
        self.velocity.linear = read_vec3(v, 0);
        self.velocity.angular = read_vec3(v, 3);
    }

    pub fn euler_coordinates(&self) -> DVector<f64> {
        let mut q = DVector::zeros(RIGID_EULER_DOFS);
        write_vec3(&mut q, 0, self.transform.position);
        let r = self.transform.rotation;
        q[3] = r.x;
        q[4] = r.y;
        q[5] = r.z;
        q[6] = r.w;
        q
    }

    pub fn set_euler_coordinates(&mut self, q: &DVector<f64>) {
        self.transform.position = read_vec3(q, 0);
        self.transform.rotation = DQuat::from_xyzw(q[3], q[4], q[5], q[6]).normalize();
    }

    /// Generalized force of a wrench `(force, torque)` acting at `point`.
    pub fn generalized_force(&self, force: DVec3, torque: DVec3, point: DVec3) -> DVector<f64> {
        let mut g = DVector::zeros(RIGID_SPATIAL_DOFS);
        write_vec3(&mut g, 0, force);
        write_vec3(
            &mut g,
            3,
            torque + (point - self.transform.position).cross(force),
        );
        g
    }

    /// Block-diagonal inverse of the spatial inertia, in world frame; `None` when singular.
    pub fn inverse_generalized_inertia(&self) -> Option<DMatrix<f64>> {
        let mut inv = DMatrix::zeros(RIGID_SPATIAL_DOFS, RIGID_SPATIAL_DOFS);
        if self.is_static {
            return Some(inv);
        }
        if self.singular {
            return None;
        }
        for i in 0..3 {
            inv[(i, i)] = self.inverse_mass;
        }
        let ii = self.world_inverse_inertia();
        for c in 0..3 {
            let col = ii.col(c);
            for r in 0..3 {
                inv[(3 + r, 3 + c)] = col[r];
            }
        }
        Some(inv)
    }

    pub fn apply_generalized_impulse(&mut self, j: &DVector<f64>) {
        if self.is_static {
            return;
        }
        self.velocity.linear += read_vec3(j, 0) * self.inverse_mass;
        self.velocity.angular += self.world_inverse_inertia() * read_vec3(j, 3);
    }

    /// Euler coordinates reached by displacing `base` along the spatial step `delta`.
    pub fn displaced_coordinates(base: &DVector<f64>, delta: &DVector<f64>) -> DVector<f64> {
        let mut q = base.clone();
        write_vec3(&mut q, 0, read_vec3(base, 0) + read_vec3(delta, 0));
        let rotation = DQuat::from_xyzw(base[3], base[4], base[5], base[6]);
        let rotated = (quat_from_rotation_vector(read_vec3(delta, 3)) * rotation).normalize();
        q[3] = rotated.x;
        q[4] = rotated.y;
        q[5] = rotated.z;
        q[6] = rotated.w;
        q
    }
}

/// Inverse of a symmetric inertia tensor, or `None` unless it is positive definite.
///
/// Scale-free: a 1 cm sphere with moments near 4e-6 still inverts.
fn invert_inertia(inertia: DMat3) -> Option<DMat3> {
    let m = Matrix3::from_column_slice(&inertia.to_cols_array());
    if m.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let factor = m.cholesky()?;
    // Reject moments that vanish relative to the largest one.
    if factor.l().diagonal().min().powi(2) <= f64::EPSILON * m.diagonal().max() {
        return None;
    }
    let inverse = factor.inverse();
    Some(DMat3::from_cols_array(&[
        inverse[(0, 0)],
        inverse[(1, 0)],
        inverse[(2, 0)],
        inverse[(0, 1)],
        inverse[(1, 1)],
        inverse[(2, 1)],
        inverse[(0, 2)],
        inverse[(1, 2)],
        inverse[(2, 2)],
    ]))
}
