//! Velocity-level impact resolution of one island.
//!
//! The island's coupling system is first reduced by eliminating the explicit
//! (bilateral) multipliers. Islands whose contacts all use linearized cones
//! are then solved as a convex QP through its KKT complementarity problem;
//! islands with exact cones or joint friction unknowns use a blocked projected
//! Gauss-Seidel sweep instead.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::{
    config::{ImpactConfig, LcpConfig, NEAR_ZERO},
    core::{body::SuperBody, constraints::UnilateralConstraint},
    dynamics::{
        island::Island,
        lcp::LcpSolver,
        problem::{ProblemData, KAPPA_INACTIVE},
    },
    error::{ResolutionError, Result},
    utils::{
        allocator::{Arena, BodyId},
        linalg::{select, select_square, select_vector, LeastSquares},
    },
};

/// Solution method chosen for an island.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactStrategy {
    Qp,
    Nqp,
}

/// Result of solving one island; nothing has been applied to the bodies yet.
#[derive(Debug, Clone)]
pub struct IslandSolution {
    /// Problem data with the impulses stored back into its constraints.
    pub problem: ProblemData,
    pub strategy: ImpactStrategy,
    /// Full solution over the problem's variable layout.
    pub z: DVector<f64>,
    /// Generalized impulse for every movable body of the island.
    pub impulses: BTreeMap<BodyId, DVector<f64>>,
    /// Kinetic energy change the impulses produce.
    pub energy_change: f64,
}

/// Aggregated statistics of one resolution epoch.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ImpactMetrics {
    pub islands_solved: usize,
    pub qp_islands: usize,
    pub nqp_islands: usize,
    pub contacts_solved: usize,
    pub limits_solved: usize,
    pub normal_impulse_sum: f64,
    pub tangent_impulse_sum: f64,
    pub energy_change: f64,
}

impl ImpactMetrics {
    pub fn record_island(&mut self, solution: &IslandSolution) {
        self.islands_solved += 1;
        match solution.strategy {
            ImpactStrategy::Qp => self.qp_islands += 1,
            ImpactStrategy::Nqp => self.nqp_islands += 1,
        }
        self.contacts_solved += solution.problem.n_contacts;
        self.limits_solved += solution.problem.n_limits;
        for contact in &solution.problem.contacts {
            self.normal_impulse_sum += contact.impulse.normal.abs();
            let [t1, t2] = contact.impulse.tangent;
            self.tangent_impulse_sum += (t1 * t1 + t2 * t2).sqrt();
        }
        self.energy_change += solution.energy_change;
    }

    pub fn merge(&mut self, other: &Self) {
        self.islands_solved += other.islands_solved;
        self.qp_islands += other.qp_islands;
        self.nqp_islands += other.nqp_islands;
        self.contacts_solved += other.contacts_solved;
        self.limits_solved += other.limits_solved;
        self.normal_impulse_sum += other.normal_impulse_sum;
        self.tangent_impulse_sum += other.tangent_impulse_sum;
        self.energy_change += other.energy_change;
    }
}

/// Coupling system with the explicit multipliers eliminated.
struct ReducedSystem {
    h: DMatrix<f64>,
    c: DVector<f64>,
    /// Full-layout index of every reduced variable.
    keep: Vec<usize>,
    explicit: Option<ExplicitElimination>,
}

struct ExplicitElimination {
    solver: LeastSquares,
    h_xz: DMatrix<f64>,
    c_x: DVector<f64>,
    offset: usize,
}

impl ReducedSystem {
    fn new(problem: &ProblemData) -> Self {
        let explicit_range = problem.alpha_x..problem.beta_t;
        let keep: Vec<usize> = (0..problem.n_vars)
            .filter(|v| !explicit_range.contains(v))
            .collect();
        let mut h = select_square(&problem.coupling, &keep);
        let mut c = select_vector(&problem.velocity, &keep);

        if explicit_range.is_empty() {
            return Self {
                h,
                c,
                keep,
                explicit: None,
            };
        }
        let x: Vec<usize> = explicit_range.collect();
        let solver = LeastSquares::new(select_square(&problem.coupling, &x));
        let h_xz = select(&problem.coupling, &x, &keep);
        let c_x = select_vector(&problem.velocity, &x);
        let h_zx = h_xz.transpose();
        h -= &h_zx * solver.solve_matrix(&h_xz);
        c -= &h_zx * solver.solve_vector(&c_x);
        log::trace!("eliminated {} explicit multipliers (rank {})", x.len(), solver.rank());
        Self {
            h,
            c,
            keep,
            explicit: Some(ExplicitElimination {
                solver,
                h_xz,
                c_x,
                offset: problem.alpha_x,
            }),
        }
    }

    /// Reduced index of a full-layout variable.
    fn index(&self, problem: &ProblemData, v: usize) -> usize {
        if v < problem.alpha_x {
            v
        } else {
            v - problem.n_constraint_eqns_exp
        }
    }

    /// Scatters a reduced solution into the full layout, recovering the
    /// explicit multipliers by back-substitution.
    fn expand(&self, n_vars: usize, zr: &DVector<f64>) -> DVector<f64> {
        let mut z = DVector::zeros(n_vars);
        for (k, &v) in self.keep.iter().enumerate() {
            z[v] = zr[k];
        }
        if let Some(e) = &self.explicit {
            let x = -e.solver.solve_vector(&(&e.h_xz * zr + &e.c_x));
            for (k, value) in x.iter().enumerate() {
                z[e.offset + k] = *value;
            }
        }
        z
    }
}

/// Impact solver: owns the configuration, borrows body state per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpactSolver {
    pub config: ImpactConfig,
    pub lcp: LcpSolver,
}

impl ImpactSolver {
    pub fn new(config: ImpactConfig, lcp: LcpConfig) -> Self {
        Self {
            config,
            lcp: LcpSolver::new(lcp),
        }
    }

    /// Solves every island; fails as a whole if any island fails.
    pub fn solve_islands(
        &self,
        islands: &[Island],
        bodies: &Arena<BodyId, SuperBody>,
        parallel: bool,
    ) -> Result<Vec<IslandSolution>> {
        #[cfg(feature = "parallel")]
        if parallel && islands.len() > 1 {
            use rayon::prelude::*;
            return islands
                .par_iter()
                .map(|island| self.solve_island(island, bodies))
                .collect();
        }
        #[cfg(not(feature = "parallel"))]
        let _ = parallel;

        islands
            .iter()
            .map(|island| self.solve_island(island, bodies))
            .collect()
    }

    /// Computes the impulses of one island without touching the bodies.
    pub fn solve_island(&self, island: &Island, bodies: &Arena<BodyId, SuperBody>) -> Result<IslandSolution> {
        let mut problem = ProblemData::assemble(island, bodies)?;
        let reduced = ReducedSystem::new(&problem);

        if self.config.use_kappa && problem.n_contacts > 0 {
            problem.kappa = self.compute_kappa(&problem, &reduced)?;
        }

        let strategy = if problem.requires_nonlinear() {
            ImpactStrategy::Nqp
        } else {
            ImpactStrategy::Qp
        };
        log::debug!(
            "island: {} contacts, {} limits, {} vars, {:?}, kappa {}",
            problem.n_contacts,
            problem.n_limits,
            problem.n_vars,
            strategy,
            if problem.kappa == KAPPA_INACTIVE { "off".to_string() } else { format!("{:.6}", problem.kappa) }
        );

        let mut zr = match strategy {
            ImpactStrategy::Qp => self.solve_qp(&problem, &reduced)?,
            ImpactStrategy::Nqp => self.solve_nqp(&problem, &reduced),
        };
        self.apply_restitution(&problem, &reduced, &mut zr);

        let z = reduced.expand(problem.n_vars, &zr);
        problem.store_impulses(&z);

        let post = &reduced.c + &reduced.h * &zr;
        let unresolved = self.unresolved(&problem, &reduced, &post);
        if !unresolved.is_empty() {
            log::debug!("{} constraints still impacting", unresolved.len());
            return Err(ResolutionError::UnresolvedImpact {
                constraints: unresolved,
            });
        }

        let energy_change = 0.5 * z.dot(&(&problem.coupling * &z)) + z.dot(&problem.velocity);
        if energy_change > self.config.impact_tolerance {
            log::warn!("impact increased kinetic energy by {energy_change:e}");
        }

        let impulses = problem.generalized_impulses(&z);
        Ok(IslandSolution {
            problem,
            strategy,
            z,
            impulses,
            energy_change,
        })
    }

    /// Reduced indices of contact normals followed by limits.
    fn normal_and_limit_indices(problem: &ProblemData, reduced: &ReducedSystem) -> Vec<usize> {
        (problem.alpha_c..problem.alpha_c + problem.n_contacts)
            .chain(problem.alpha_l..problem.alpha_l + problem.n_limits)
            .map(|v| reduced.index(problem, v))
            .collect()
    }

    /// Total normal impulse of the frictionless problem.
    fn compute_kappa(&self, problem: &ProblemData, reduced: &ReducedSystem) -> Result<f64> {
        let idx = Self::normal_and_limit_indices(problem, reduced);
        let m = select_square(&reduced.h, &idx);
        let q = select_vector(&reduced.c, &idx);
        let z = self.lcp.solve(&m, &q, "frictionless impact")?;
        Ok(z.rows(0, problem.n_contacts).sum())
    }

    /// Minimum kinetic energy change subject to non-interpenetration and
    /// linearized friction cones, solved through the KKT conditions
    /// `[[H, -Aᵀ], [A, 0]]`, `[c; b]`.
    fn solve_qp(&self, problem: &ProblemData, reduced: &ReducedSystem) -> Result<DVector<f64>> {
        let n = reduced.h.nrows();
        let normals = Self::normal_and_limit_indices(problem, reduced);
        let friction_rows = problem.contact_edges.iter().filter(|&&k| k > 0).count();
        let kappa_row = problem.kappa != KAPPA_INACTIVE;
        let n_rows = normals.len() + friction_rows + usize::from(kappa_row);

        let mut a = DMatrix::zeros(n_rows, n);
        let mut b = DVector::zeros(n_rows);
        for (r, &v) in normals.iter().enumerate() {
            a.row_mut(r).copy_from(&reduced.h.row(v));
            b[r] = reduced.c[v];
        }
        let mut r = normals.len();
        for (i, &k) in problem.contact_edges.iter().enumerate() {
            if k == 0 {
                continue;
            }
            a[(r, reduced.index(problem, problem.alpha_c + i))] = problem.friction_coefficient(i);
            let off = problem.edge_offsets[i];
            for e in 0..k {
                a[(r, reduced.index(problem, problem.beta_c + off + e))] = -1.0;
                a[(r, reduced.index(problem, problem.nbeta_c + off + e))] = -1.0;
            }
            r += 1;
        }
        if kappa_row {
            for i in 0..problem.n_contacts {
                a[(r, reduced.index(problem, problem.alpha_c + i))] = 1.0;
            }
            b[r] = -problem.kappa;
        }

        let size = n + n_rows;
        let mut m = DMatrix::zeros(size, size);
        m.view_mut((0, 0), (n, n)).copy_from(&reduced.h);
        m.view_mut((0, n), (n, n_rows)).copy_from(&(-a.transpose()));
        m.view_mut((n, 0), (n_rows, n)).copy_from(&a);
        let mut q = DVector::zeros(size);
        q.rows_mut(0, n).copy_from(&reduced.c);
        q.rows_mut(n, n_rows).copy_from(&b);
        log::trace!("impact QP KKT matrix {m}");
        log::trace!("impact QP KKT vector {q}");

        let solution = self.lcp.solve(&m, &q, "impact QP")?;
        Ok(solution.rows(0, n).into_owned())
    }

    /// Blocked projected Gauss-Seidel over contacts, limits and joint friction.
    fn solve_nqp(&self, problem: &ProblemData, reduced: &ReducedSystem) -> DVector<f64> {
        let h = &reduced.h;
        let c = &reduced.c;
        let mut z = DVector::zeros(h.nrows());
        let idx = |v: usize| reduced.index(problem, v);

        // Single coordinate Gauss-Seidel step, unprojected.
        let step = |z: &DVector<f64>, v: usize| -> f64 {
            let diag = h[(v, v)];
            if diag < NEAR_ZERO {
                return z[v];
            }
            let residual = c[v] + h.column(v).dot(z);
            z[v] - residual / diag
        };

        for sweep in 0..self.config.nqp_iterations {
            let mut max_delta = 0.0_f64;
            let mut update = |z: &mut DVector<f64>, v: usize, value: f64| {
                max_delta = max_delta.max((value - z[v]).abs());
                z[v] = value;
            };

            for i in 0..problem.n_contacts {
                let n = idx(problem.alpha_c + i);
                let value = step(&z, n).max(0.0);
                update(&mut z, n, value);
                let limit = problem.friction_coefficient(i) * z[n];

                if i < problem.n_lin_cone {
                    let off = problem.edge_offsets[i];
                    let k = problem.contact_edges[i];
                    let vars: Vec<usize> = (0..k)
                        .map(|e| idx(problem.beta_c + off + e))
                        .chain((0..k).map(|e| idx(problem.nbeta_c + off + e)))
                        .collect();
                    for &v in &vars {
                        let value = step(&z, v).max(0.0);
                        update(&mut z, v, value);
                    }
                    let total: f64 = vars.iter().map(|&v| z[v]).sum();
                    if total > limit {
                        let scale = if total > 0.0 { limit / total } else { 0.0 };
                        for &v in &vars {
                            let value = z[v] * scale;
                            update(&mut z, v, value);
                        }
                    }
                } else {
                    let u = idx(problem.betau_c + 2 * (i - problem.n_lin_cone));
                    let t1 = step(&z, u);
                    update(&mut z, u, t1);
                    let t2 = step(&z, u + 1);
                    update(&mut z, u + 1, t2);
                    let norm = (z[u] * z[u] + z[u + 1] * z[u + 1]).sqrt();
                    if norm > limit {
                        let scale = if norm > 0.0 { limit / norm } else { 0.0 };
                        let (p1, p2) = (z[u] * scale, z[u + 1] * scale);
                        update(&mut z, u, p1);
                        update(&mut z, u + 1, p2);
                    }
                }
            }

            for l in 0..problem.n_limits {
                let v = idx(problem.alpha_l + l);
                let value = step(&z, v).max(0.0);
                update(&mut z, v, value);
            }

            for (d, bound) in problem.joint_friction_bounds.iter().enumerate() {
                let v = idx(problem.beta_t + d);
                let value = step(&z, v).clamp(-bound, *bound);
                update(&mut z, v, value);
            }

            if max_delta <= self.config.nqp_tolerance {
                log::trace!("NQP converged after {} sweeps", sweep + 1);
                break;
            }
        }
        z
    }

    /// Poisson restitution: each normal impulse grows by `e` times its compression impulse.
    fn apply_restitution(&self, problem: &ProblemData, reduced: &ReducedSystem, zr: &mut DVector<f64>) {
        for (i, contact) in problem.contacts.iter().enumerate() {
            if contact.restitution > 0.0 {
                let n = reduced.index(problem, problem.alpha_c + i);
                zr[n] *= 1.0 + contact.restitution;
            }
        }
    }

    fn unresolved(
        &self,
        problem: &ProblemData,
        reduced: &ReducedSystem,
        post: &DVector<f64>,
    ) -> Vec<UnilateralConstraint> {
        let tol = self.config.impact_tolerance;
        let mut offending = Vec::new();
        for (i, contact) in problem.contacts.iter().enumerate() {
            if post[reduced.index(problem, problem.alpha_c + i)] < -tol {
                offending.push(contact.clone().into());
            }
        }
        for (l, limit) in problem.limits.iter().enumerate() {
            if post[reduced.index(problem, problem.alpha_l + l)] < -tol {
                offending.push(limit.clone().into());
            }
        }
        offending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        constraints::{BodyLink, ContactConstraint, FrictionModel},
        rigidbody::RigidBody,
        types::{MassProperties, Transform},
    };
    use crate::dynamics::island::IslandManager;
    use crate::utils::allocator::GeometryId;
    use approx::assert_relative_eq;
    use glam::DVec3;

    fn ball_on_ground(velocity: DVec3, model: FrictionModel, restitution: f64) -> (Arena<BodyId, SuperBody>, Island) {
        let mut bodies: Arena<BodyId, SuperBody> = Arena::new();
        let ground = bodies.insert(RigidBody::fixed(Transform::default()).into());
        let ball = bodies.insert(
            RigidBody::new(MassProperties::solid_sphere(0.5, 2.0))
                .with_position(DVec3::new(0.0, 0.5, 0.0))
                .with_velocity(velocity, DVec3::ZERO)
                .into(),
        );
        let contact: UnilateralConstraint = ContactConstraint::new(
            (GeometryId::from_index(0), BodyLink::rigid(ball)),
            (GeometryId::from_index(1), BodyLink::rigid(ground)),
            DVec3::ZERO,
            DVec3::Y,
            0.0,
        )
        .with_friction(0.5, model)
        .with_restitution(restitution)
        .into();
        let mut manager = IslandManager::new();
        manager.build_islands(&bodies, &[contact]).unwrap();
        let island = manager.into_islands().remove(0);
        (bodies, island)
    }

    #[test]
    fn inelastic_qp_stops_normal_motion() {
        let (bodies, island) = ball_on_ground(DVec3::new(0.0, -3.0, 0.0), FrictionModel::LinearizedCone { edges: 4 }, 0.0);
        let solution = ImpactSolver::default().solve_island(&island, &bodies).unwrap();
        assert_eq!(solution.strategy, ImpactStrategy::Qp);
        let contact = &solution.problem.contacts[0];
        assert_relative_eq!(contact.impulse.normal, 6.0, epsilon = 1e-6);
        assert!(solution.energy_change <= 1e-9);
        assert_relative_eq!(solution.energy_change, -9.0, epsilon = 1e-6);
    }

    #[test]
    fn elastic_exact_cone_reverses_normal_motion() {
        let (bodies, island) = ball_on_ground(DVec3::new(0.0, -3.0, 0.0), FrictionModel::ExactCone, 1.0);
        let solution = ImpactSolver::default().solve_island(&island, &bodies).unwrap();
        assert_eq!(solution.strategy, ImpactStrategy::Nqp);
        assert_relative_eq!(solution.problem.contacts[0].impulse.normal, 12.0, epsilon = 1e-6);
        assert_relative_eq!(solution.energy_change, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn kappa_matches_frictionless_normal_impulse() {
        let (bodies, island) = ball_on_ground(DVec3::new(0.0, -1.0, 0.0), FrictionModel::LinearizedCone { edges: 4 }, 0.0);
        let solver = ImpactSolver::new(
            ImpactConfig {
                use_kappa: true,
                ..ImpactConfig::default()
            },
            LcpConfig::default(),
        );
        let solution = solver.solve_island(&island, &bodies).unwrap();
        assert_relative_eq!(solution.problem.kappa, 2.0, epsilon = 1e-9);
        assert!(solution.problem.contacts[0].impulse.normal >= 2.0 - 1e-6);
    }

    #[test]
    fn impulses_land_on_the_movable_body_only() {
        let (bodies, island) = ball_on_ground(DVec3::new(0.0, -1.0, 0.0), FrictionModel::LinearizedCone { edges: 4 }, 0.0);
        let solution = ImpactSolver::default().solve_island(&island, &bodies).unwrap();
        assert_eq!(solution.impulses.len(), 1);
        let impulse = solution.impulses.values().next().unwrap();
        assert_relative_eq!(impulse[1], 2.0, epsilon = 1e-6);
    }
}
