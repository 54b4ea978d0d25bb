//! Global tolerances, iteration caps, and the serializable solver configuration.

use serde::{Deserialize, Serialize};

/// Generic "numerically zero" threshold.
pub const NEAR_ZERO: f64 = 1e-8;

/// Relative normal / limit velocity below `-IMPACT_TOLERANCE` counts as impacting.
pub const DEFAULT_IMPACT_TOLERANCE: f64 = 1e-6;

/// Geometry pairs closer than this produce contact constraints.
pub const DEFAULT_CONTACT_DISTANCE: f64 = 1e-4;

/// Joint dofs with less slack than this produce limit constraints.
pub const DEFAULT_LIMIT_TOLERANCE: f64 = 1e-4;

/// Penetration deeper than this triggers position stabilization.
pub const DEFAULT_PENETRATION_TOLERANCE: f64 = 1e-6;

/// Outer iteration cap of the position stabilizer.
pub const DEFAULT_STABILIZATION_ITERATIONS: usize = 50;

/// Armijo sufficient-decrease parameter of the stabilizer line search.
pub const DEFAULT_ARMIJO_ALPHA: f64 = 0.05;

/// Multiplicative step shrink of the stabilizer line search.
pub const DEFAULT_STEP_SHRINK: f64 = 0.8;

/// Smallest line search step before the search is declared stalled.
pub const DEFAULT_MIN_STEP: f64 = 1e-6;

/// Sweep cap of the projected Gauss-Seidel nonlinear solve.
pub const DEFAULT_NQP_ITERATIONS: usize = 500;

/// Converged when no impulse changes by more than this during a sweep.
pub const DEFAULT_NQP_TOLERANCE: f64 = 1e-12;

/// Settings of the complementarity solver primitive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LcpConfig {
    /// Principal pivots allowed per unknown before the fast solve declines.
    pub fast_pivots_per_variable: usize,
    /// Lemke pivots allowed per unknown.
    pub lemke_pivots_per_variable: usize,
    /// Smallest regularization exponent tried by the fallback (`10^min`).
    pub min_regularization_exp: i32,
    /// Largest regularization exponent tried by the fallback (`10^max`).
    pub max_regularization_exp: i32,
    /// Tolerance used to validate a candidate solution.
    pub tolerance: f64,
}

impl Default for LcpConfig {
    fn default() -> Self {
        Self {
            fast_pivots_per_variable: 4,
            lemke_pivots_per_variable: 50,
            min_regularization_exp: -16,
            max_regularization_exp: -2,
            tolerance: 1e-8,
        }
    }
}

/// Settings of the velocity-level impact solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Derive the kappa lower bound from a frictionless LCP before the main solve.
    pub use_kappa: bool,
    pub impact_tolerance: f64,
    pub nqp_iterations: usize,
    pub nqp_tolerance: f64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            use_kappa: false,
            impact_tolerance: DEFAULT_IMPACT_TOLERANCE,
            nqp_iterations: DEFAULT_NQP_ITERATIONS,
            nqp_tolerance: DEFAULT_NQP_TOLERANCE,
        }
    }
}

/// Settings of the configuration-level position stabilizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationConfig {
    pub penetration_tolerance: f64,
    pub max_iterations: usize,
    pub armijo_alpha: f64,
    pub step_shrink: f64,
    pub min_step: f64,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            penetration_tolerance: DEFAULT_PENETRATION_TOLERANCE,
            max_iterations: DEFAULT_STABILIZATION_ITERATIONS,
            armijo_alpha: DEFAULT_ARMIJO_ALPHA,
            step_shrink: DEFAULT_STEP_SHRINK,
            min_step: DEFAULT_MIN_STEP,
        }
    }
}

/// Aggregate configuration owned by [`crate::world::ContactWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub contact_distance: f64,
    pub limit_tolerance: f64,
    pub lcp: LcpConfig,
    pub impact: ImpactConfig,
    pub stabilization: StabilizationConfig,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            contact_distance: DEFAULT_CONTACT_DISTANCE,
            limit_tolerance: DEFAULT_LIMIT_TOLERANCE,
            lcp: LcpConfig::default(),
            impact: ImpactConfig::default(),
            stabilization: StabilizationConfig::default(),
        }
    }
}
