//! Contact Resolution – impact and penetration handling for multi-body simulation.
//!
//! The crate takes a set of rigid bodies and articulated chains together with
//! their collision geometry, detects contacts and joint limits, partitions them
//! into independent islands, and resolves impacts with an LCP/QP formulation
//! (or a projected Gauss-Seidel solve for exact friction cones). A separate
//! stabilizer removes interpenetration at the configuration level.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::{DMat3, DQuat, DVec3};

pub use collision::{Geometry, PairwiseDistance, Shape};
pub use config::{ImpactConfig, LcpConfig, ResolutionConfig, StabilizationConfig};
pub use core::{
    articulations::{JointLimits, JointType, Link, Multibody},
    body::{GeneralizedCoordinateType, SuperBody},
    constraints::{
        BodyLink, ContactConstraint, FrictionModel, LimitBound, LimitConstraint, UnilateralConstraint,
    },
    rigidbody::RigidBody,
    types::{MassProperties, Material, MixingMode, Transform, Velocity},
};
pub use dynamics::{
    impact::{ImpactMetrics, ImpactSolver, ImpactStrategy},
    island::{Island, IslandManager},
    lcp::LcpSolver,
    stabilization::{ConfigurationSystem, PositionStabilizer, StabilizationReport},
};
pub use error::{ErrorKind, ResolutionError, Result};
pub use utils::allocator::{Arena, BodyId, GeometryId};
pub use world::{ContactWorld, ImpactReport};
