//! Core types describing bodies, materials, and unilateral constraints.

pub mod articulations;
pub mod body;
pub mod constraints;
pub mod rigidbody;
pub mod types;

pub use articulations::{ExplicitConstraint, JointLimits, JointType, Link, Multibody};
pub use body::{GeneralizedCoordinateType, SuperBody};
pub use constraints::{
    BodyLink, ContactConstraint, ContactImpulse, FrictionModel, LimitBound, LimitConstraint,
    UnilateralConstraint,
};
pub use rigidbody::RigidBody;
pub use types::{MassProperties, Material, MaterialPairProperties, MixingMode, Transform, Velocity};
