use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use super::constraints::FrictionModel;

/// Position and orientation of a body or link frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_position(position: DVec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Applies another transform on top of this one, returning the composition.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.position + self.rotation * point
    }

    pub fn transform_vector(&self, vector: DVec3) -> DVec3 {
        self.rotation * vector
    }
}

/// Linear and angular velocity of a rigid body, both in world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: DVec3,
    pub angular: DVec3,
}

/// Mass and body-frame inertia tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f64,
    pub inertia: DMat3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            inertia: DMat3::IDENTITY,
        }
    }
}

impl MassProperties {
    pub fn solid_sphere(radius: f64, mass: f64) -> Self {
        Self {
            mass,
            inertia: DMat3::from_diagonal(DVec3::splat(0.4 * mass * radius * radius)),
        }
    }

    pub fn solid_box(half_extents: DVec3, mass: f64) -> Self {
        let l = half_extents * 2.0;
        let factor = mass / 12.0;
        Self {
            mass,
            inertia: DMat3::from_diagonal(DVec3::new(
                factor * (l.y * l.y + l.z * l.z),
                factor * (l.x * l.x + l.z * l.z),
                factor * (l.x * l.x + l.y * l.y),
            )),
        }
    }
}

/// Surface coefficients carried by a collision geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub friction: f64,
    pub restitution: f64,
    pub friction_model: FrictionModel,
    pub mixing: MixingMode,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
            friction_model: FrictionModel::LinearizedCone { edges: 4 },
            mixing: MixingMode::default(),
        }
    }
}

impl Material {
    pub fn frictionless() -> Self {
        Self {
            friction: 0.0,
            ..Self::default()
        }
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_friction_model(mut self, model: FrictionModel) -> Self {
        self.friction_model = model;
        self
    }

    /// Mixes two materials into the coefficients of a contact between them.
    pub fn combine_pair(a: &Self, b: &Self) -> MaterialPairProperties {
        let mode = a.mixing.resolve(b.mixing);
        MaterialPairProperties {
            friction: mode.combine(a.friction, b.friction),
            restitution: a.restitution.max(b.restitution),
            friction_model: a.friction_model.finer(b.friction_model),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MixingMode {
    Average,
    Min,
    Max,
    #[default]
    GeometricMean,
}

impl MixingMode {
    fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            MixingMode::Average => 0.5 * (a + b),
            MixingMode::Min => a.min(b),
            MixingMode::Max => a.max(b),
            MixingMode::GeometricMean => (a.abs() * b.abs()).sqrt(),
        }
    }

    fn resolve(self, other: MixingMode) -> MixingMode {
        if matches!(self, MixingMode::GeometricMean) {
            other
        } else {
            self
        }
    }
}

/// Coefficients of a contact between two materials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialPairProperties {
    pub friction: f64,
    pub restitution: f64,
    pub friction_model: FrictionModel,
}
