//! Uniform generalized-coordinate interface over every kind of super body.

use super::articulations::Multibody;
use super::constraints::LimitBound;
use super::rigidbody::{RigidBody, RIGID_EULER_DOFS, RIGID_SPATIAL_DOFS};
use super::types::Transform;
use glam::DVec3;
use nalgebra::{DMatrix, DVector};

/// Representation a generalized vector is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralizedCoordinateType {
    /// Configuration coordinates (positions and unit quaternions).
    Euler,
    /// Velocity-space coordinates; impulses and displacements live here.
    Spatial,
}

/// A body that receives generalized impulses as a whole: a single rigid body
/// or an articulated tree.
#[derive(Debug, Clone)]
pub enum SuperBody {
    Rigid(RigidBody),
    Articulated(Multibody),
}

impl From<RigidBody> for SuperBody {
    fn from(body: RigidBody) -> Self {
        SuperBody::Rigid(body)
    }
}

impl From<Multibody> for SuperBody {
    fn from(body: Multibody) -> Self {
        SuperBody::Articulated(body)
    }
}

impl SuperBody {
    pub fn as_rigid(&self) -> Option<&RigidBody> {
        match self {
            SuperBody::Rigid(body) => Some(body),
            SuperBody::Articulated(_) => None,
        }
    }

    pub fn as_rigid_mut(&mut self) -> Option<&mut RigidBody> {
        match self {
            SuperBody::Rigid(body) => Some(body),
            SuperBody::Articulated(_) => None,
        }
    }

    pub fn as_multibody(&self) -> Option<&Multibody> {
        match self {
            SuperBody::Rigid(_) => None,
            SuperBody::Articulated(body) => Some(body),
        }
    }

    pub fn as_multibody_mut(&mut self) -> Option<&mut Multibody> {
        match self {
            SuperBody::Rigid(_) => None,
            SuperBody::Articulated(body) => Some(body),
        }
    }

    pub fn num_generalized_coordinates(&self, gc: GeneralizedCoordinateType) -> usize {
        match (self, gc) {
            (SuperBody::Rigid(_), GeneralizedCoordinateType::Euler) => RIGID_EULER_DOFS,
            (SuperBody::Rigid(_), GeneralizedCoordinateType::Spatial) => RIGID_SPATIAL_DOFS,
            (SuperBody::Articulated(mb), _) => mb.total_dofs,
        }
    }

    /// Configuration in Euler coordinates.
    pub fn generalized_coordinates(&self) -> DVector<f64> {
        match self {
            SuperBody::Rigid(body) => body.euler_coordinates(),
            SuperBody::Articulated(mb) => DVector::from_column_slice(&mb.q),
        }
    }

    pub fn set_generalized_coordinates(&mut self, q: &DVector<f64>) {
        match self {
            SuperBody::Rigid(body) => body.set_euler_coordinates(q),
            SuperBody::Articulated(mb) => mb.q.copy_from_slice(q.as_slice()),
        }
    }

    /// Velocity in spatial coordinates.
    pub fn generalized_velocity(&self) -> DVector<f64> {
        match self {
            SuperBody::Rigid(body) => body.spatial_velocity(),
            SuperBody::Articulated(mb) => DVector::from_column_slice(&mb.dq),
        }
    }

    pub fn set_generalized_velocity(&mut self, v: &DVector<f64>) {
        match self {
            SuperBody::Rigid(body) => body.set_spatial_velocity(v),
            SuperBody::Articulated(mb) => mb.dq.copy_from_slice(v.as_slice()),
        }
    }

    /// True when impulses cannot move the body; such bodies never join islands.
    pub fn is_immovable(&self) -> bool {
        match self {
            SuperBody::Rigid(body) => body.is_immovable(),
            SuperBody::Articulated(mb) => mb.total_dofs == 0,
        }
    }

    /// True when `link` addresses this body: `None` for a rigid body, an existing
    /// link index for a multibody.
    pub fn has_link(&self, link: Option<usize>) -> bool {
        match (self, link) {
            (SuperBody::Rigid(_), None) => true,
            (SuperBody::Articulated(mb), Some(i)) => i < mb.links.len(),
            _ => false,
        }
    }

    /// Generalized force of a wrench applied at `point` on the given link;
    /// `None` when the link does not belong to the body.
    pub fn convert_to_generalized_force(
        &self,
        link: Option<usize>,
        force: DVec3,
        torque: DVec3,
        point: DVec3,
    ) -> Option<DVector<f64>> {
        match (self, link) {
            (SuperBody::Rigid(body), None) => Some(body.generalized_force(force, torque, point)),
            (SuperBody::Articulated(mb), Some(i)) if i < mb.links.len() => {
                Some(mb.generalized_force(i, force, torque, point))
            }
            _ => None,
        }
    }

    /// Inverse generalized inertia in spatial coordinates; `None` when singular.
    pub fn inverse_generalized_inertia(&self) -> Option<DMatrix<f64>> {
        match self {
            SuperBody::Rigid(body) => body.inverse_generalized_inertia(),
            SuperBody::Articulated(mb) => mb.inverse_generalized_inertia(),
        }
    }

    /// Velocity change `M⁻¹ j` a generalized impulse would cause; `None` when
    /// the inertia could not be inverted. Leaves the body untouched.
    pub fn velocity_change(&self, impulse: &DVector<f64>) -> Option<DVector<f64>> {
        match self {
            SuperBody::Rigid(body) => Some(body.inverse_generalized_inertia()? * impulse),
            SuperBody::Articulated(mb) => {
                if mb.total_dofs == 0 {
                    return Some(DVector::zeros(0));
                }
                Some(mb.generalized_inertia().cholesky()?.solve(impulse))
            }
        }
    }

    /// Adds a velocity change computed by [`SuperBody::velocity_change`].
    pub fn add_generalized_velocity(&mut self, delta: &DVector<f64>) {
        match self {
            SuperBody::Rigid(body) => {
                if !body.is_immovable() {
                    let v = body.spatial_velocity() + delta;
                    body.set_spatial_velocity(&v);
                }
            }
            SuperBody::Articulated(mb) => {
                for (dq, d) in mb.dq.iter_mut().zip(delta.iter()) {
                    *dq += d;
                }
            }
        }
    }

    /// Applies a generalized impulse; `None` when the inertia could not be inverted.
    pub fn apply_generalized_impulse(&mut self, impulse: &DVector<f64>) -> Option<()> {
        let delta = self.velocity_change(impulse)?;
        self.add_generalized_velocity(&delta);
        Some(())
    }

    pub fn kinetic_energy(&self) -> f64 {
        match self {
            SuperBody::Rigid(body) => body.kinetic_energy(),
            SuperBody::Articulated(mb) => mb.kinetic_energy(),
        }
    }

    /// Euler coordinates reached by moving `base` (Euler) along `delta` (spatial).
    pub fn displaced_coordinates(&self, base: &DVector<f64>, delta: &DVector<f64>) -> DVector<f64> {
        match self {
            SuperBody::Rigid(_) => RigidBody::displaced_coordinates(base, delta),
            SuperBody::Articulated(_) => base + delta,
        }
    }

    /// World velocity of `point` moving with the given link; `None` for a foreign link.
    pub fn point_velocity(&self, link: Option<usize>, point: DVec3) -> Option<DVec3> {
        match (self, link) {
            (SuperBody::Rigid(body), None) => Some(body.point_velocity(point)),
            (SuperBody::Articulated(mb), Some(i)) if i < mb.links.len() => {
                Some(mb.point_velocity(i, point))
            }
            _ => None,
        }
    }

    /// World frame of the body, or of one of its links.
    pub fn link_transform(&self, link: Option<usize>) -> Option<Transform> {
        match (self, link) {
            (SuperBody::Rigid(body), None) => Some(body.transform),
            (SuperBody::Rigid(_), Some(_)) => None,
            (SuperBody::Articulated(mb), Some(i)) => mb.link_transform(i),
            (SuperBody::Articulated(mb), None) => Some(mb.base),
        }
    }

    pub fn limit_slacks(&self) -> Vec<(usize, LimitBound, f64)> {
        match self {
            SuperBody::Rigid(_) => Vec::new(),
            SuperBody::Articulated(mb) => mb.limit_slacks(),
        }
    }

    pub fn limit_violation(&self) -> f64 {
        self.as_multibody().map_or(0.0, Multibody::limit_violation)
    }

    pub fn num_constraint_eqns_explicit(&self) -> usize {
        self.as_multibody()
            .map_or(0, Multibody::num_constraint_eqns_explicit)
    }

    /// Explicit bilateral constraint rows in spatial coordinates.
    pub fn explicit_constraint_jacobian(&self) -> DMatrix<f64> {
        match self {
            SuperBody::Rigid(_) => DMatrix::zeros(0, RIGID_SPATIAL_DOFS),
            SuperBody::Articulated(mb) => mb.explicit_constraint_jacobian(),
        }
    }

    pub fn uses_advanced_friction_model(&self) -> bool {
        self.as_multibody()
            .is_some_and(|mb| mb.use_advanced_friction_model)
    }

    pub fn num_joint_friction_dofs(&self) -> usize {
        self.as_multibody().map_or(0, Multibody::num_joint_friction_dofs)
    }

    pub fn joint_friction_bounds(&self) -> Vec<f64> {
        self.as_multibody()
            .map(Multibody::joint_friction_bounds)
            .unwrap_or_default()
    }
}
