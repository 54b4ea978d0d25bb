use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::core::constraints::BodyLink;
use crate::core::types::{Material, Transform};

/// Collision shape in the geometry's local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Sphere { radius: f64 },
    /// Solid below the plane through the local origin with outward `normal`.
    HalfSpace { normal: DVec3 },
}

/// A shape rigidly attached to a body or link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub shape: Shape,
    pub body: BodyLink,
    /// Pose of the shape relative to the body (or link) frame.
    pub local: Transform,
    pub material: Material,
}

impl Geometry {
    pub fn new(shape: Shape, body: BodyLink) -> Self {
        Self {
            shape,
            body,
            local: Transform::default(),
            material: Material::default(),
        }
    }

    pub fn sphere(radius: f64, body: BodyLink) -> Self {
        Self::new(Shape::Sphere { radius }, body)
    }

    /// Half-space whose boundary plane passes through the body origin.
    pub fn half_space(normal: DVec3, body: BodyLink) -> Self {
        Self::new(
            Shape::HalfSpace {
                normal: normal.normalize(),
            },
            body,
        )
    }

    pub fn with_offset(mut self, offset: DVec3) -> Self {
        self.local.position = offset;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// World pose given the pose of the owning body or link.
    pub fn world_pose(&self, body_pose: &Transform) -> Transform {
        body_pose.combine(&self.local)
    }

    /// Geometries that never move do not need pairwise checks against each other.
    pub fn is_unbounded(&self) -> bool {
        matches!(self.shape, Shape::HalfSpace { .. })
    }
}
