use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::types::MaterialPairProperties;
use crate::utils::{
    allocator::{BodyId, GeometryId},
    math::tangent_basis,
};

/// How tangential (frictional) impulses are constrained at a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrictionModel {
    /// Polygonal cone with `edges` edges, i.e. `edges / 2` tangent directions
    /// each carrying a positive and a negative impulse variable.
    LinearizedCone { edges: u32 },
    /// Exact quadratic cone `|f_t| <= mu * f_n`.
    ExactCone,
}

impl FrictionModel {
    pub fn is_exact(&self) -> bool {
        matches!(self, FrictionModel::ExactCone)
    }

    /// Number of tangent directions of a linearized cone (zero for the exact cone).
    pub fn edge_directions(&self) -> usize {
        match self {
            FrictionModel::LinearizedCone { edges } => (*edges / 2) as usize,
            FrictionModel::ExactCone => 0,
        }
    }

    /// The more faithful of two models.
    pub fn finer(self, other: FrictionModel) -> FrictionModel {
        match (self, other) {
            (FrictionModel::ExactCone, _) | (_, FrictionModel::ExactCone) => {
                FrictionModel::ExactCone
            }
            (
                FrictionModel::LinearizedCone { edges: a },
                FrictionModel::LinearizedCone { edges: b },
            ) => FrictionModel::LinearizedCone { edges: a.max(b) },
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            FrictionModel::LinearizedCone { edges } if *edges < 2 || *edges % 2 != 0 => {
                Err("linearized friction cone needs an even edge count of at least two")
            }
            _ => Ok(()),
        }
    }
}

/// A single body taking part in a constraint: a rigid body, or one link of an
/// articulated body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyLink {
    /// The super body receiving generalized impulses.
    pub body: BodyId,
    /// Link index inside an articulated body; `None` for rigid bodies.
    pub link: Option<usize>,
}

impl BodyLink {
    pub fn rigid(body: BodyId) -> Self {
        Self { body, link: None }
    }

    pub fn link(body: BodyId, link: usize) -> Self {
        Self {
            body,
            link: Some(link),
        }
    }
}

/// Resolved contact impulse: normal magnitude and components along the two tangents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactImpulse {
    pub normal: f64,
    pub tangent: [f64; 2],
}

/// Point contact between two geometries.
///
/// The normal points from geometry B into geometry A, so a positive normal
/// impulse pushes A along `normal` and B against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactConstraint {
    pub geometry_a: GeometryId,
    pub geometry_b: GeometryId,
    pub body_a: BodyLink,
    pub body_b: BodyLink,
    pub point: DVec3,
    pub normal: DVec3,
    pub tangents: [DVec3; 2],
    pub friction: f64,
    pub friction_model: FrictionModel,
    pub restitution: f64,
    /// Signed distance between the geometries when the contact was created.
    pub distance: f64,
    pub impulse: ContactImpulse,
}

impl ContactConstraint {
    pub fn new(
        (geometry_a, body_a): (GeometryId, BodyLink),
        (geometry_b, body_b): (GeometryId, BodyLink),
        point: DVec3,
        normal: DVec3,
        distance: f64,
    ) -> Self {
        let (t1, t2) = if normal.is_normalized() {
            tangent_basis(normal)
        } else {
            (DVec3::ZERO, DVec3::ZERO)
        };
        Self {
            geometry_a,
            geometry_b,
            body_a,
            body_b,
            point,
            normal,
            tangents: [t1, t2],
            friction: 0.0,
            friction_model: FrictionModel::LinearizedCone { edges: 4 },
            restitution: 0.0,
            distance,
            impulse: ContactImpulse::default(),
        }
    }

    pub fn with_material(mut self, pair: MaterialPairProperties) -> Self {
        self.friction = pair.friction;
        self.restitution = pair.restitution;
        self.friction_model = pair.friction_model;
        self
    }

    pub fn with_friction(mut self, friction: f64, model: FrictionModel) -> Self {
        self.friction = friction;
        self.friction_model = model;
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Tangential variable directions: polygon edge directions for a
    /// linearized cone, the two tangents for an exact cone.
    pub fn friction_directions(&self) -> Vec<DVec3> {
        match self.friction_model {
            FrictionModel::ExactCone => self.tangents.to_vec(),
            FrictionModel::LinearizedCone { .. } => {
                let k = self.friction_model.edge_directions();
                (0..k)
                    .map(|j| {
                        let theta = std::f64::consts::PI * j as f64 / k as f64;
                        self.tangents[0] * theta.cos() + self.tangents[1] * theta.sin()
                    })
                    .collect()
            }
        }
    }

    /// Impulse applied to body A, in world frame.
    pub fn world_impulse(&self) -> DVec3 {
        self.normal * self.impulse.normal
            + self.tangents[0] * self.impulse.tangent[0]
            + self.tangents[1] * self.impulse.tangent[1]
    }
}

/// Which side of a joint range is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitBound {
    Lower,
    Upper,
}

impl LimitBound {
    /// Sign of the joint motion that moves away from the bound.
    pub fn direction(&self) -> f64 {
        match self {
            LimitBound::Lower => 1.0,
            LimitBound::Upper => -1.0,
        }
    }
}

/// Joint at (or beyond) one end of its range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitConstraint {
    pub body: BodyId,
    pub dof: usize,
    pub bound: LimitBound,
    /// Signed distance to the bound (negative when violated).
    pub slack: f64,
    pub impulse: f64,
}

impl LimitConstraint {
    pub fn new(body: BodyId, dof: usize, bound: LimitBound, slack: f64) -> Self {
        Self {
            body,
            dof,
            bound,
            slack,
            impulse: 0.0,
        }
    }
}

/// A contact or a joint limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnilateralConstraint {
    Contact(ContactConstraint),
    JointLimit(LimitConstraint),
}

impl UnilateralConstraint {
    /// Super bodies touched by the constraint (one for limits, two for contacts).
    pub fn super_bodies(&self) -> impl Iterator<Item = BodyId> {
        let (first, second) = match self {
            UnilateralConstraint::Contact(c) => (c.body_a.body, Some(c.body_b.body)),
            UnilateralConstraint::JointLimit(l) => (l.body, None),
        };
        std::iter::once(first).chain(second)
    }

    pub fn as_contact(&self) -> Option<&ContactConstraint> {
        match self {
            UnilateralConstraint::Contact(c) => Some(c),
            UnilateralConstraint::JointLimit(_) => None,
        }
    }

    pub fn as_limit(&self) -> Option<&LimitConstraint> {
        match self {
            UnilateralConstraint::Contact(_) => None,
            UnilateralConstraint::JointLimit(l) => Some(l),
        }
    }

    pub fn is_contact(&self) -> bool {
        matches!(self, UnilateralConstraint::Contact(_))
    }
}

impl From<ContactConstraint> for UnilateralConstraint {
    fn from(contact: ContactConstraint) -> Self {
        UnilateralConstraint::Contact(contact)
    }
}

impl From<LimitConstraint> for UnilateralConstraint {
    fn from(limit: LimitConstraint) -> Self {
        UnilateralConstraint::JointLimit(limit)
    }
}
