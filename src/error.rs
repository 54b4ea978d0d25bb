//! Error types for impact resolution and position stabilization.

use crate::core::constraints::UnilateralConstraint;
use crate::utils::allocator::BodyId;
use thiserror::Error;

/// Broad failure category, for callers that only branch on the class of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NumericalDegeneracy,
    UnresolvedImpact,
    SolverExhaustion,
    Stabilization,
}

/// Errors raised while resolving constraints.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// A constraint carries unusable geometry or coefficients.
    #[error("degenerate constraint {constraint}: {reason}")]
    DegenerateConstraint {
        /// Index of the constraint in the input list.
        constraint: usize,
        reason: String,
    },

    /// The generalized inertia of a body could not be inverted.
    #[error("singular generalized inertia for body {body:?}")]
    SingularInertia { body: BodyId },

    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),

    /// A link index that does not name a link of the body (or a link on a rigid body).
    #[error("body {body:?} has no link {link:?}")]
    UnknownLink { body: BodyId, link: Option<usize> },

    /// Constraints still approaching after the impulses were computed.
    #[error("{} constraint(s) still impacting after resolution", constraints.len())]
    UnresolvedImpact {
        constraints: Vec<UnilateralConstraint>,
    },

    /// Neither the fast nor the regularized complementarity solve succeeded.
    #[error("{problem} problem of size {size} could not be solved")]
    SolverExhausted { problem: &'static str, size: usize },

    #[error("stabilization did not converge in {iterations} iterations (merit {merit:e})")]
    StabilizationLimit { iterations: usize, merit: f64 },

    #[error("stabilization line search stalled at merit {merit:e}")]
    LineSearchStalled { merit: f64 },
}

impl ResolutionError {
    pub fn degenerate(constraint: usize, reason: impl Into<String>) -> Self {
        Self::DegenerateConstraint {
            constraint,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DegenerateConstraint { .. }
            | Self::SingularInertia { .. }
            | Self::UnknownBody(_)
            | Self::UnknownLink { .. } => ErrorKind::NumericalDegeneracy,
            Self::UnresolvedImpact { .. } => ErrorKind::UnresolvedImpact,
            Self::SolverExhausted { .. } => ErrorKind::SolverExhaustion,
            Self::StabilizationLimit { .. } | Self::LineSearchStalled { .. } => {
                ErrorKind::Stabilization
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolutionError>;
