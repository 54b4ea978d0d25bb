//! Configuration-level removal of interpenetration and joint limit violation.
//!
//! Each iteration linearizes the signed distances and limit slacks around the
//! current configuration, solves a position LCP for the smallest generalized
//! displacement that closes them, and takes the longest step along it that
//! passes an Armijo test on the merit function.

use nalgebra::DVector;

use crate::{
    config::{LcpConfig, StabilizationConfig},
    core::{body::SuperBody, constraints::UnilateralConstraint},
    dynamics::{
        apply::GeneralizedDisplacement,
        island::IslandManager,
        lcp::LcpSolver,
        problem::ProblemData,
    },
    error::{ResolutionError, Result},
    utils::allocator::{Arena, BodyId},
};

/// A system whose configuration can be corrected: bodies plus a way to query
/// distances and position-level constraints.
pub trait ConfigurationSystem {
    fn bodies(&self) -> &Arena<BodyId, SuperBody>;
    fn bodies_mut(&mut self) -> &mut Arena<BodyId, SuperBody>;
    /// Smallest signed distance over all geometry pairs at the current
    /// configuration (`f64::INFINITY` without pairs).
    fn min_pairwise_distance(&mut self) -> f64;
    /// Contacts of nearby pairs and limits with little slack.
    fn position_constraints(&mut self) -> Vec<UnilateralConstraint>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StabilizationReport {
    pub iterations: usize,
    pub initial_merit: f64,
    pub final_merit: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PositionStabilizer {
    pub config: StabilizationConfig,
    pub lcp: LcpSolver,
}

impl PositionStabilizer {
    pub fn new(config: StabilizationConfig, lcp: LcpConfig) -> Self {
        Self {
            config,
            lcp: LcpSolver::new(lcp),
        }
    }

    /// `max(max(-min_dist, 0), worst limit violation)`.
    pub fn merit<S: ConfigurationSystem>(&self, system: &mut S) -> f64 {
        let penetration = (-system.min_pairwise_distance()).max(0.0);
        system
            .bodies()
            .iter()
            .map(|(_, body)| body.limit_violation())
            .fold(penetration, f64::max)
    }

    pub fn needs_stabilization(&self, merit: f64) -> bool {
        merit > self.config.penetration_tolerance
    }

    /// Runs until the merit drops under the penetration tolerance. On success
    /// the system holds the corrected configuration; velocities are untouched.
    pub fn stabilize<S: ConfigurationSystem>(&self, system: &mut S) -> Result<StabilizationReport> {
        let initial_merit = self.merit(system);
        let mut report = StabilizationReport {
            iterations: 0,
            initial_merit,
            final_merit: initial_merit,
        };
        if !self.needs_stabilization(initial_merit) {
            return Ok(report);
        }

        let mut displacement = GeneralizedDisplacement::new(system.bodies());
        let mut merit = initial_merit;
        while report.iterations < self.config.max_iterations {
            report.iterations += 1;
            self.compute_displacement(system, &mut displacement)?;
            merit = self.line_search(system, &displacement, merit)?;
            report.final_merit = merit;
            log::debug!("stabilization iteration {}: merit {merit:e}", report.iterations);
            if !self.needs_stabilization(merit) {
                return Ok(report);
            }
        }
        Err(ResolutionError::StabilizationLimit {
            iterations: report.iterations,
            merit,
        })
    }

    /// Fills `displacement` with `Δq_b = M_b⁻¹ J_bᵀ z` from every island's position LCP.
    fn compute_displacement<S: ConfigurationSystem>(
        &self,
        system: &mut S,
        displacement: &mut GeneralizedDisplacement,
    ) -> Result<()> {
        displacement.clear();
        let constraints = system.position_constraints();
        let bodies = system.bodies();
        let mut islands = IslandManager::new();
        islands.build_islands(bodies, &constraints)?;

        for island in islands.islands() {
            let problem = ProblemData::assemble_position(island, bodies)?;
            let q = DVector::from_iterator(
                problem.n_vars,
                problem
                    .contacts
                    .iter()
                    .map(|c| c.distance)
                    .chain(problem.limits.iter().map(|l| l.slack)),
            );
            log::trace!("position LCP vector {q}");
            let z = self.lcp.solve(&problem.coupling, &q, "position")?;
            for (id, impulse) in problem.generalized_impulses(&z) {
                if let Some(inverse) = problem.inverse_inertia(id) {
                    displacement.add(id, &(inverse * impulse));
                }
            }
        }
        Ok(())
    }

    /// Backtracking search for a step with `s(t) ≤ (1 - α t) s₀`; returns the accepted merit.
    fn line_search<S: ConfigurationSystem>(
        &self,
        system: &mut S,
        displacement: &GeneralizedDisplacement,
        merit: f64,
    ) -> Result<f64> {
        let base = displacement.snapshot(system.bodies());
        if displacement.is_zero() {
            return Err(ResolutionError::LineSearchStalled { merit });
        }
        let mut step = 1.0;
        loop {
            displacement.apply(system.bodies_mut(), &base, step);
            let trial = self.merit(system);
            if trial <= (1.0 - self.config.armijo_alpha * step) * merit {
                return Ok(trial);
            }
            step *= self.config.step_shrink;
            if step < self.config.min_step {
                GeneralizedDisplacement::restore(system.bodies_mut(), &base);
                return Err(ResolutionError::LineSearchStalled { merit });
            }
        }
    }
}
