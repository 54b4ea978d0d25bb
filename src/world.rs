use crate::{
    collision::{
        distance::{find_contacts, proximity, PairwiseDistance},
        shapes::Geometry,
    },
    config::ResolutionConfig,
    core::{
        articulations::Multibody,
        body::SuperBody,
        constraints::{ContactConstraint, LimitConstraint, UnilateralConstraint},
        rigidbody::RigidBody,
        types::{Material, Transform},
    },
    dynamics::{
        apply::ImpulseAccumulator,
        impact::{ImpactMetrics, ImpactSolver},
        island::IslandManager,
        stabilization::{ConfigurationSystem, PositionStabilizer, StabilizationReport},
    },
    error::{ResolutionError, Result},
    utils::{
        allocator::{Arena, BodyId, GeometryId},
        logging::{PhaseTimings, ScopedTimer},
    },
};

/// Outcome of one impact resolution epoch.
#[derive(Debug, Clone, Default)]
pub struct ImpactReport {
    /// Every detected (or supplied) constraint, in input order, with the
    /// impulses of the epoch stored in it.
    pub constraints: Vec<UnilateralConstraint>,
    /// Islands that were actually solved (the approaching ones).
    pub islands: usize,
    pub metrics: ImpactMetrics,
}

/// Owner of the bodies, geometries, and cached pairwise distances the
/// resolution pipeline works on.
pub struct ContactWorld {
    pub bodies: Arena<BodyId, SuperBody>,
    pub geometries: Arena<GeometryId, Geometry>,
    config: ResolutionConfig,
    pairwise: Vec<PairwiseDistance>,
    parallel_enabled: bool,
    timings: PhaseTimings,
}

impl Default for ContactWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactWorld {
    pub fn new() -> Self {
        Self::with_config(ResolutionConfig::default())
    }

    pub fn with_config(config: ResolutionConfig) -> Self {
        Self {
            bodies: Arena::new(),
            geometries: Arena::new(),
            config,
            pairwise: Vec::new(),
            parallel_enabled: false,
            timings: PhaseTimings::default(),
        }
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ResolutionConfig {
        &mut self.config
    }

    /// Solves islands on the rayon pool when the `parallel` feature is built.
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.parallel_enabled = enabled;
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel_enabled
    }

    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    pub fn add_body(&mut self, body: impl Into<SuperBody>) -> BodyId {
        self.bodies.insert(body.into())
    }

    pub fn add_rigid_body(&mut self, body: RigidBody) -> BodyId {
        self.add_body(body)
    }

    pub fn add_multibody(&mut self, body: Multibody) -> BodyId {
        self.add_body(body)
    }

    /// Removes a body together with every geometry attached to it.
    pub fn remove_body(&mut self, id: BodyId) -> Option<SuperBody> {
        let attached: Vec<GeometryId> = self
            .geometries
            .iter()
            .filter(|(_, g)| g.body.body == id)
            .map(|(gid, _)| gid)
            .collect();
        for gid in attached {
            self.geometries.remove(gid);
        }
        self.pairwise.clear();
        self.bodies.remove(id)
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> Result<GeometryId> {
        let owner = geometry.body.body;
        let body = self
            .bodies
            .get(owner)
            .ok_or(ResolutionError::UnknownBody(owner))?;
        if body.link_transform(geometry.body.link).is_none() {
            return Err(ResolutionError::UnknownBody(owner));
        }
        Ok(self.geometries.insert(geometry))
    }

    pub fn body(&self, id: BodyId) -> Option<&SuperBody> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut SuperBody> {
        self.bodies.get_mut(id)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id)
    }

    /// World pose of a geometry at the current configuration.
    pub fn geometry_pose(&self, geometry: &Geometry) -> Option<Transform> {
        self.bodies
            .get(geometry.body.body)?
            .link_transform(geometry.body.link)
            .map(|pose| geometry.world_pose(&pose))
    }

    pub fn total_kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(|(_, b)| b.kinetic_energy()).sum()
    }

    /// Recomputes the signed distance of every geometry pair that can collide.
    ///
    /// Pairs on the same super body, pairs of two immovable bodies, and
    /// unsupported shape pairs are skipped.
    pub fn calc_pairwise_distances(&mut self) -> &[PairwiseDistance] {
        let _timer = ScopedTimer::new("detection::pairwise");
        let posed: Vec<(GeometryId, &Geometry, Transform, bool)> = self
            .geometries
            .iter()
            .filter_map(|(id, g)| {
                let body = self.bodies.get(g.body.body)?;
                let pose = self.geometry_pose(g)?;
                Some((id, g, pose, body.is_immovable()))
            })
            .collect();

        let mut pairwise = Vec::new();
        for (i, (id_a, a, pose_a, fixed_a)) in posed.iter().enumerate() {
            for (id_b, b, pose_b, fixed_b) in &posed[i + 1..] {
                if a.body.body == b.body.body || (*fixed_a && *fixed_b) {
                    continue;
                }
                if let Some(p) = proximity(a, pose_a, b, pose_b) {
                    pairwise.push(PairwiseDistance {
                        geometry_a: *id_a,
                        geometry_b: *id_b,
                        distance: p.distance,
                        point_a: p.point_a,
                        point_b: p.point_b,
                    });
                }
            }
        }
        self.pairwise = pairwise;
        &self.pairwise
    }

    /// Distances cached by the last [`ContactWorld::calc_pairwise_distances`].
    pub fn pairwise_distances(&self) -> &[PairwiseDistance] {
        &self.pairwise
    }

    fn cached_min_distance(&self) -> f64 {
        self.pairwise
            .iter()
            .map(|p| p.distance)
            .fold(f64::INFINITY, f64::min)
    }

    /// Contacts for pairs closer than `contact_distance` and limits with less
    /// slack than `limit_tolerance`, in deterministic (id) order.
    pub fn find_constraints(&mut self) -> Vec<UnilateralConstraint> {
        let (contact_distance, limit_tolerance) =
            (self.config.contact_distance, self.config.limit_tolerance);
        self.find_constraints_within(contact_distance, limit_tolerance)
    }

    fn find_constraints_within(&mut self, contact_distance: f64, limit_tolerance: f64) -> Vec<UnilateralConstraint> {
        self.calc_pairwise_distances();
        let mut constraints: Vec<UnilateralConstraint> = Vec::new();

        for record in &self.pairwise {
            if record.distance >= contact_distance {
                continue;
            }
            let (Some(a), Some(b)) = (
                self.geometries.get(record.geometry_a),
                self.geometries.get(record.geometry_b),
            ) else {
                continue;
            };
            let (Some(pose_a), Some(pose_b)) = (self.geometry_pose(a), self.geometry_pose(b)) else {
                continue;
            };
            let pair = Material::combine_pair(&a.material, &b.material);
            for contact in find_contacts(a, &pose_a, b, &pose_b) {
                constraints.push(
                    ContactConstraint::new(
                        (record.geometry_a, a.body),
                        (record.geometry_b, b.body),
                        contact.point,
                        contact.normal,
                        contact.distance,
                    )
                    .with_material(pair)
                    .into(),
                );
            }
        }

        for (id, body) in self.bodies.iter() {
            for (dof, bound, slack) in body.limit_slacks() {
                if slack < limit_tolerance {
                    constraints.push(LimitConstraint::new(id, dof, bound, slack).into());
                }
            }
        }

        log::debug!("detected {} constraints", constraints.len());
        constraints
    }

    /// Detects constraints and resolves impacts at the current state.
    pub fn resolve_impacts(&mut self) -> Result<ImpactReport> {
        let mut elapsed = std::time::Duration::ZERO;
        let constraints = {
            let _timer = ScopedTimer::accumulate("detection", &mut elapsed);
            self.find_constraints()
        };
        self.timings.detection += elapsed;
        self.resolve_constraints(constraints)
    }

    /// Resolves impacts for a given constraint list.
    ///
    /// Either every approaching island is solved and all impulses are applied,
    /// or an error is returned and no body is modified.
    pub fn resolve_constraints(&mut self, constraints: Vec<UnilateralConstraint>) -> Result<ImpactReport> {
        let islands = {
            let _timer = ScopedTimer::accumulate("partition", &mut self.timings.partition);
            let mut manager = IslandManager::new();
            manager.build_islands(&self.bodies, &constraints)?;
            manager.remove_nonimpacting_islands(&self.bodies, self.config.impact.impact_tolerance)?;
            manager.into_islands()
        };

        let solver = ImpactSolver::new(self.config.impact, self.config.lcp);
        let solutions = {
            let _timer = ScopedTimer::accumulate("solve", &mut self.timings.solve);
            solver.solve_islands(&islands, &self.bodies, self.parallel_enabled)?
        };

        let _timer = ScopedTimer::accumulate("apply", &mut self.timings.apply);
        let mut report = ImpactReport {
            constraints,
            islands: solutions.len(),
            metrics: ImpactMetrics::default(),
        };
        let mut accumulator = ImpulseAccumulator::new();
        for solution in &solutions {
            report.metrics.record_island(solution);
            accumulator.extend(&solution.impulses);
            for (index, constraint) in solution.problem.constraints() {
                report.constraints[index] = constraint;
            }
        }
        accumulator.apply(&mut self.bodies)?;
        Ok(report)
    }

    /// Removes interpenetration and joint limit violation by moving bodies.
    pub fn stabilize(&mut self) -> Result<StabilizationReport> {
        let stabilizer = PositionStabilizer::new(self.config.stabilization, self.config.lcp);
        let mut elapsed = std::time::Duration::ZERO;
        let result = {
            let _timer = ScopedTimer::accumulate("stabilization", &mut elapsed);
            stabilizer.stabilize(self)
        };
        self.timings.stabilization += elapsed;
        result
    }

    pub fn min_pairwise_distance(&mut self) -> f64 {
        self.calc_pairwise_distances();
        self.cached_min_distance()
    }
}

impl ConfigurationSystem for ContactWorld {
    fn bodies(&self) -> &Arena<BodyId, SuperBody> {
        &self.bodies
    }

    fn bodies_mut(&mut self) -> &mut Arena<BodyId, SuperBody> {
        &mut self.bodies
    }

    fn min_pairwise_distance(&mut self) -> f64 {
        ContactWorld::min_pairwise_distance(self)
    }

    fn position_constraints(&mut self) -> Vec<UnilateralConstraint> {
        let (contact_distance, limit_tolerance) =
            (self.config.contact_distance, self.config.limit_tolerance);
        self.find_constraints_within(contact_distance, limit_tolerance)
    }
}
