//! Per-island assembly of the inertia-projected coupling system `J M⁻¹ Jᵀ`.
//!
//! Every unknown of the island gets one slot in a single variable layout:
//!
//! ```text
//! [ cn | β+ (linearized) | β- (linearized) | β (true cones) | limits | explicit | joint friction ]
//!   ^alpha_c ^beta_c        ^nbeta_c          ^betau_c         ^alpha_l ^alpha_x  ^beta_t
//! ```
//!
//! Each constraint (and each explicit / joint friction block of a body)
//! contributes a group of generalized Jacobian rows. The coupling matrix is
//! filled block by block from those groups and mirrored at the end.

use std::collections::BTreeMap;

use glam::DVec3;
use nalgebra::{DMatrix, DVector};

use crate::{
    core::{
        body::{GeneralizedCoordinateType, SuperBody},
        constraints::{ContactConstraint, FrictionModel, LimitConstraint, UnilateralConstraint},
    },
    dynamics::island::Island,
    error::{ResolutionError, Result},
    utils::{allocator::{Arena, BodyId}, linalg::mirror_upper},
};

/// Deviation from unit length tolerated on normals and tangents.
const UNIT_TOLERANCE: f64 = 1e-6;

/// Unset kappa: the `Σ cn ≥ kappa` row is inactive.
pub const KAPPA_INACTIVE: f64 = -f64::MAX;

/// Which rows an island problem carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// Velocity-level impact problem: every variable family.
    Impact,
    /// Configuration-level problem: contact normals and joint limits only.
    Position,
}

/// Contiguous family of unknowns in the variable layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableFamily {
    Normal,
    Edge,
    NegatedEdge,
    TrueCone,
    Limit,
    Explicit,
    JointFriction,
}

/// Generalized Jacobian rows of one constraint (or one body's explicit /
/// joint-friction block) together with the variables they drive.
#[derive(Debug, Clone)]
struct RowGroup {
    variables: Vec<usize>,
    /// `(body, rows)`; `rows` is `variables.len() × spatial dofs of body`.
    rows: Vec<(BodyId, DMatrix<f64>)>,
    velocity: DVector<f64>,
}

#[derive(Debug, Clone)]
pub struct ProblemData {
    pub kind: ProblemKind,
    /// Contacts, linearized cones first, then exact cones.
    pub contacts: Vec<ContactConstraint>,
    /// Index of every contact in the partitioned constraint list.
    pub contact_indices: Vec<usize>,
    pub limits: Vec<LimitConstraint>,
    pub limit_indices: Vec<usize>,
    pub super_bodies: Vec<BodyId>,

    pub n_contacts: usize,
    pub n_limits: usize,
    pub n_lin_cone: usize,
    pub n_true_cone: usize,
    pub n_k_total: usize,
    pub n_gc: usize,
    pub n_constraint_eqns_exp: usize,
    pub n_constraint_dof_imp: usize,

    pub alpha_c: usize,
    pub beta_c: usize,
    pub nbeta_c: usize,
    pub betau_c: usize,
    pub alpha_l: usize,
    pub alpha_x: usize,
    pub beta_t: usize,
    pub n_vars: usize,

    /// Edge directions of every linearized contact.
    pub contact_edges: Vec<usize>,
    /// Offset of every linearized contact's edges inside the `β+` family.
    pub edge_offsets: Vec<usize>,
    pub joint_friction_bounds: Vec<f64>,

    /// `J M⁻¹ Jᵀ` over the whole layout.
    pub coupling: DMatrix<f64>,
    /// `J v⁻` over the whole layout.
    pub velocity: DVector<f64>,
    pub kappa: f64,

    groups: Vec<RowGroup>,
    inverse_inertia: BTreeMap<BodyId, DMatrix<f64>>,
    body_offsets: BTreeMap<BodyId, (usize, usize)>,
}

fn body_ref(bodies: &Arena<BodyId, SuperBody>, id: BodyId) -> Result<&SuperBody> {
    bodies.get(id).ok_or(ResolutionError::UnknownBody(id))
}

fn is_finite(v: DVec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

fn is_unit(v: DVec3) -> bool {
    is_finite(v) && (v.length() - 1.0).abs() <= UNIT_TOLERANCE
}

fn validate_contact(
    index: usize,
    c: &ContactConstraint,
    bodies: &Arena<BodyId, SuperBody>,
) -> Result<()> {
    for side in [c.body_a, c.body_b] {
        if !body_ref(bodies, side.body)?.has_link(side.link) {
            return Err(ResolutionError::degenerate(
                index,
                "contact link is not part of its body",
            ));
        }
    }
    if !is_unit(c.normal) {
        return Err(ResolutionError::degenerate(index, "normal is not unit length"));
    }
    if !is_finite(c.point) {
        return Err(ResolutionError::degenerate(index, "contact point is not finite"));
    }
    if !c.friction.is_finite() || c.friction < 0.0 {
        return Err(ResolutionError::degenerate(index, "friction coefficient is negative"));
    }
    if !c.restitution.is_finite() || c.restitution < 0.0 {
        return Err(ResolutionError::degenerate(index, "restitution is negative"));
    }
    c.friction_model
        .validate()
        .map_err(|reason| ResolutionError::degenerate(index, reason))?;
    for t in &c.tangents {
        if !is_unit(*t) || t.dot(c.normal).abs() > UNIT_TOLERANCE {
            return Err(ResolutionError::degenerate(
                index,
                "tangents are not orthonormal to the normal",
            ));
        }
    }
    Ok(())
}

/// Rows `d_kᵀ` of a contact for every body it touches (B receives the negated rows).
fn contact_rows(
    c: &ContactConstraint,
    directions: &[DVec3],
    bodies: &Arena<BodyId, SuperBody>,
) -> Result<Vec<(BodyId, DMatrix<f64>)>> {
    let mut rows: Vec<(BodyId, DMatrix<f64>)> = Vec::with_capacity(2);
    for (link, sign) in [(c.body_a, 1.0), (c.body_b, -1.0)] {
        let body = body_ref(bodies, link.body)?;
        let ndof = body.num_generalized_coordinates(GeneralizedCoordinateType::Spatial);
        let mut block = DMatrix::zeros(directions.len(), ndof);
        for (r, d) in directions.iter().enumerate() {
            let g = body
                .convert_to_generalized_force(link.link, *d * sign, DVec3::ZERO, c.point)
                .ok_or(ResolutionError::UnknownLink {
                    body: link.body,
                    link: link.link,
                })?;
            block.row_mut(r).copy_from(&g.transpose());
        }
        match rows.iter_mut().find(|(id, _)| *id == link.body) {
            Some((_, existing)) => *existing += block,
            None => rows.push((link.body, block)),
        }
    }
    Ok(rows)
}

fn group_velocity(
    rows: &[(BodyId, DMatrix<f64>)],
    n_rows: usize,
    bodies: &Arena<BodyId, SuperBody>,
) -> Result<DVector<f64>> {
    let mut v = DVector::zeros(n_rows);
    for (id, block) in rows {
        v += block * body_ref(bodies, *id)?.generalized_velocity();
    }
    Ok(v)
}

impl ProblemData {
    /// Builds the impact problem of an island.
    pub fn assemble(island: &Island, bodies: &Arena<BodyId, SuperBody>) -> Result<Self> {
        Self::assemble_kind(island, bodies, ProblemKind::Impact)
    }

    /// Builds the position problem of an island (normals and limits only).
    pub fn assemble_position(island: &Island, bodies: &Arena<BodyId, SuperBody>) -> Result<Self> {
        Self::assemble_kind(island, bodies, ProblemKind::Position)
    }

    fn assemble_kind(
        island: &Island,
        bodies: &Arena<BodyId, SuperBody>,
        kind: ProblemKind,
    ) -> Result<Self> {
        let mut contacts = Vec::new();
        let mut limits = Vec::new();
        for (constraint, &index) in island.constraints.iter().zip(&island.indices) {
            match constraint {
                UnilateralConstraint::Contact(c) => {
                    validate_contact(index, c, bodies)?;
                    contacts.push((index, c.clone()));
                }
                UnilateralConstraint::JointLimit(l) => {
                    let body = body_ref(bodies, l.body)?;
                    if body.as_multibody().map_or(true, |mb| l.dof >= mb.total_dofs) {
                        return Err(ResolutionError::degenerate(
                            index,
                            "limit refers to a missing joint dof",
                        ));
                    }
                    limits.push((index, l.clone()));
                }
            }
        }
        // Stable: detection order survives inside each friction class.
        contacts.sort_by_key(|(_, c)| c.friction_model.is_exact());

        let (contact_indices, contacts): (Vec<_>, Vec<_>) = contacts.into_iter().unzip();
        let (limit_indices, limits): (Vec<_>, Vec<_>) = limits.into_iter().unzip();

        let n_contacts = contacts.len();
        let n_limits = limits.len();
        let n_lin_cone = contacts
            .iter()
            .take_while(|c| !c.friction_model.is_exact())
            .count();
        let n_true_cone = n_contacts - n_lin_cone;
        debug_assert!(contacts[n_lin_cone..]
            .iter()
            .all(|c| c.friction_model.is_exact()));

        let impact = kind == ProblemKind::Impact;
        let contact_edges: Vec<usize> = contacts[..n_lin_cone]
            .iter()
            .map(|c| if impact { c.friction_model.edge_directions() } else { 0 })
            .collect();
        let mut edge_offsets = Vec::with_capacity(n_lin_cone);
        let mut n_k_total = 0;
        for k in &contact_edges {
            edge_offsets.push(n_k_total);
            n_k_total += k;
        }
        let n_true_vars = if impact { 2 * n_true_cone } else { 0 };

        let mut inverse_inertia = BTreeMap::new();
        let mut body_offsets = BTreeMap::new();
        let mut n_gc = 0;
        let mut n_constraint_eqns_exp = 0;
        let mut n_constraint_dof_imp = 0;
        for &id in &island.bodies {
            let body = body_ref(bodies, id)?;
            let ndof = body.num_generalized_coordinates(GeneralizedCoordinateType::Spatial);
            let inverse = body
                .inverse_generalized_inertia()
                .ok_or(ResolutionError::SingularInertia { body: id })?;
            inverse_inertia.insert(id, inverse);
            body_offsets.insert(id, (n_gc, ndof));
            n_gc += ndof;
            if impact {
                n_constraint_eqns_exp += body.num_constraint_eqns_explicit();
                n_constraint_dof_imp += body.num_joint_friction_dofs();
            }
        }

        let alpha_c = 0;
        let beta_c = alpha_c + n_contacts;
        let nbeta_c = beta_c + n_k_total;
        let betau_c = nbeta_c + n_k_total;
        let alpha_l = betau_c + n_true_vars;
        let alpha_x = alpha_l + n_limits;
        let beta_t = alpha_x + n_constraint_eqns_exp;
        let n_vars = beta_t + n_constraint_dof_imp;

        let mut groups = Vec::with_capacity(n_contacts + n_limits + island.bodies.len());
        for (i, c) in contacts.iter().enumerate() {
            let mut directions = vec![c.normal];
            let mut variables = vec![alpha_c + i];
            if impact {
                if i < n_lin_cone {
                    let dirs = c.friction_directions();
                    let off = edge_offsets[i];
                    directions.extend(dirs.iter().copied());
                    directions.extend(dirs.iter().map(|d| -*d));
                    variables.extend((0..dirs.len()).map(|k| beta_c + off + k));
                    variables.extend((0..dirs.len()).map(|k| nbeta_c + off + k));
                } else {
                    let u = betau_c + 2 * (i - n_lin_cone);
                    directions.extend(c.tangents);
                    variables.extend([u, u + 1]);
                }
            }
            let rows = contact_rows(c, &directions, bodies)?;
            let velocity = group_velocity(&rows, directions.len(), bodies)?;
            groups.push(RowGroup {
                variables,
                rows,
                velocity,
            });
        }

        for (i, l) in limits.iter().enumerate() {
            let body = body_ref(bodies, l.body)?;
            let ndof = body.num_generalized_coordinates(GeneralizedCoordinateType::Spatial);
            let mut row = DMatrix::zeros(1, ndof);
            row[(0, l.dof)] = l.bound.direction();
            let rows = vec![(l.body, row)];
            let velocity = group_velocity(&rows, 1, bodies)?;
            groups.push(RowGroup {
                variables: vec![alpha_l + i],
                rows,
                velocity,
            });
        }

        let mut joint_friction_bounds = Vec::with_capacity(n_constraint_dof_imp);
        if impact {
            let mut x_off = alpha_x;
            let mut t_off = beta_t;
            for &id in &island.bodies {
                let body = body_ref(bodies, id)?;
                let explicit = body.explicit_constraint_jacobian();
                if explicit.nrows() > 0 {
                    let n = explicit.nrows();
                    let rows = vec![(id, explicit)];
                    let velocity = group_velocity(&rows, n, bodies)?;
                    groups.push(RowGroup {
                        variables: (x_off..x_off + n).collect(),
                        rows,
                        velocity,
                    });
                    x_off += n;
                }
                let n = body.num_joint_friction_dofs();
                if n > 0 {
                    let rows = vec![(id, DMatrix::identity(n, n))];
                    let velocity = group_velocity(&rows, n, bodies)?;
                    groups.push(RowGroup {
                        variables: (t_off..t_off + n).collect(),
                        rows,
                        velocity,
                    });
                    let bounds = body.joint_friction_bounds();
                    if bounds.iter().any(|b| !b.is_finite() || *b < 0.0) {
                        let index = island
                            .constraints
                            .iter()
                            .zip(&island.indices)
                            .find(|(c, _)| c.super_bodies().any(|b| b == id))
                            .map_or(0, |(_, &i)| i);
                        return Err(ResolutionError::degenerate(
                            index,
                            "joint friction bound is negative or not finite",
                        ));
                    }
                    joint_friction_bounds.extend(bounds);
                    t_off += n;
                }
            }
        }

        let mut problem = Self {
            kind,
            contacts,
            contact_indices,
            limits,
            limit_indices,
            super_bodies: island.bodies.clone(),
            n_contacts,
            n_limits,
            n_lin_cone,
            n_true_cone,
            n_k_total,
            n_gc,
            n_constraint_eqns_exp,
            n_constraint_dof_imp,
            alpha_c,
            beta_c,
            nbeta_c,
            betau_c,
            alpha_l,
            alpha_x,
            beta_t,
            n_vars,
            contact_edges,
            edge_offsets,
            joint_friction_bounds,
            coupling: DMatrix::zeros(n_vars, n_vars),
            velocity: DVector::zeros(n_vars),
            kappa: KAPPA_INACTIVE,
            groups,
            inverse_inertia,
            body_offsets,
        };
        problem.fill_coupling();
        log::trace!(
            "assembled {:?} problem: {} contacts ({} true cones), {} limits, {} vars",
            kind,
            n_contacts,
            n_true_cone,
            n_limits,
            n_vars
        );
        Ok(problem)
    }

    fn fill_coupling(&mut self) {
        let mut coupling = DMatrix::zeros(self.n_vars, self.n_vars);
        let mut velocity = DVector::zeros(self.n_vars);
        for i in 0..self.groups.len() {
            let (block, v) = self.constraint_data(i);
            let vars = &self.groups[i].variables;
            for (r, &vi) in vars.iter().enumerate() {
                velocity[vi] = v[r];
                for (c, &vj) in vars.iter().enumerate() {
                    coupling[(vi.min(vj), vi.max(vj))] = block[(r, c)];
                }
            }
            for j in (i + 1)..self.groups.len() {
                let Some(block) = self.cross_constraint_data(i, j) else {
                    continue;
                };
                let vars_j = &self.groups[j].variables;
                for (r, &vi) in vars.iter().enumerate() {
                    for (c, &vj) in vars_j.iter().enumerate() {
                        coupling[(vi.min(vj), vi.max(vj))] = block[(r, c)];
                    }
                }
            }
        }
        mirror_upper(&mut coupling);
        self.coupling = coupling;
        self.velocity = velocity;
    }

    /// Number of row groups: constraints (contacts then limits) followed by
    /// the explicit and joint friction blocks of the bodies.
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// `(J_i M⁻¹ J_iᵀ, J_i v)` of row group `i`.
    pub fn constraint_data(&self, i: usize) -> (DMatrix<f64>, DVector<f64>) {
        let group = &self.groups[i];
        let n = group.variables.len();
        let mut block = DMatrix::zeros(n, n);
        for (id, rows) in &group.rows {
            if let Some(inverse) = self.inverse_inertia.get(id) {
                block += rows * inverse * rows.transpose();
            }
        }
        (block, group.velocity.clone())
    }

    /// `J_i M⁻¹ J_jᵀ`, or `None` when the groups share no movable body.
    pub fn cross_constraint_data(&self, i: usize, j: usize) -> Option<DMatrix<f64>> {
        let (gi, gj) = (&self.groups[i], &self.groups[j]);
        let mut block: Option<DMatrix<f64>> = None;
        for (id, rows_i) in &gi.rows {
            let Some(inverse) = self.inverse_inertia.get(id) else {
                continue;
            };
            for (other, rows_j) in &gj.rows {
                if other != id {
                    continue;
                }
                let product = rows_i * inverse * rows_j.transpose();
                match block.as_mut() {
                    Some(b) => *b += product,
                    None => block = Some(product),
                }
            }
        }
        block
    }

    pub fn range(&self, family: VariableFamily) -> std::ops::Range<usize> {
        match family {
            VariableFamily::Normal => self.alpha_c..self.beta_c,
            VariableFamily::Edge => self.beta_c..self.nbeta_c,
            VariableFamily::NegatedEdge => self.nbeta_c..self.betau_c,
            VariableFamily::TrueCone => self.betau_c..self.alpha_l,
            VariableFamily::Limit => self.alpha_l..self.alpha_x,
            VariableFamily::Explicit => self.alpha_x..self.beta_t,
            VariableFamily::JointFriction => self.beta_t..self.n_vars,
        }
    }

    /// Coupling block between two variable families.
    pub fn block(&self, rows: VariableFamily, cols: VariableFamily) -> DMatrix<f64> {
        let (r, c) = (self.range(rows), self.range(cols));
        self.coupling
            .view((r.start, c.start), (r.len(), c.len()))
            .into_owned()
    }

    pub fn velocity_block(&self, family: VariableFamily) -> DVector<f64> {
        let r = self.range(family);
        self.velocity.rows(r.start, r.len()).into_owned()
    }

    /// True when the island needs the nonlinear solve.
    pub fn requires_nonlinear(&self) -> bool {
        self.n_true_cone > 0 || self.n_constraint_dof_imp > 0
    }

    pub fn friction_coefficient(&self, contact: usize) -> f64 {
        self.contacts[contact].friction
    }

    pub fn body_offset(&self, body: BodyId) -> Option<(usize, usize)> {
        self.body_offsets.get(&body).copied()
    }

    pub fn inverse_inertia(&self, body: BodyId) -> Option<&DMatrix<f64>> {
        self.inverse_inertia.get(&body)
    }

    /// Generalized impulse `J_bᵀ z` of every movable body for a solution over the layout.
    pub fn generalized_impulses(&self, z: &DVector<f64>) -> BTreeMap<BodyId, DVector<f64>> {
        let mut impulses: BTreeMap<BodyId, DVector<f64>> = BTreeMap::new();
        for group in &self.groups {
            let local = DVector::from_iterator(
                group.variables.len(),
                group.variables.iter().map(|&v| z[v]),
            );
            if local.iter().all(|x| *x == 0.0) {
                continue;
            }
            for (id, rows) in &group.rows {
                if !self.inverse_inertia.contains_key(id) {
                    continue;
                }
                let g = rows.transpose() * &local;
                impulses
                    .entry(*id)
                    .and_modify(|acc| *acc += &g)
                    .or_insert(g);
            }
        }
        impulses
    }

    /// Writes a solution back into the island's contacts and limits.
    pub fn store_impulses(&mut self, z: &DVector<f64>) {
        for i in 0..self.n_contacts {
            let normal = z[self.alpha_c + i];
            let tangent = if self.kind == ProblemKind::Position {
                [0.0, 0.0]
            } else if i < self.n_lin_cone {
                let c = &self.contacts[i];
                let off = self.edge_offsets[i];
                let f = c
                    .friction_directions()
                    .iter()
                    .enumerate()
                    .fold(DVec3::ZERO, |acc, (k, d)| {
                        acc + *d * (z[self.beta_c + off + k] - z[self.nbeta_c + off + k])
                    });
                [f.dot(c.tangents[0]), f.dot(c.tangents[1])]
            } else {
                let u = self.betau_c + 2 * (i - self.n_lin_cone);
                [z[u], z[u + 1]]
            };
            let impulse = &mut self.contacts[i].impulse;
            impulse.normal = normal;
            impulse.tangent = tangent;
        }
        for i in 0..self.n_limits {
            self.limits[i].impulse = z[self.alpha_l + i];
        }
    }

    /// Contacts and limits with their stored impulses, each with its partition index.
    pub fn constraints(&self) -> Vec<(usize, UnilateralConstraint)> {
        let contacts = self
            .contact_indices
            .iter()
            .zip(&self.contacts)
            .map(|(&i, c)| (i, UnilateralConstraint::Contact(c.clone())));
        let limits = self
            .limit_indices
            .iter()
            .zip(&self.limits)
            .map(|(&i, l)| (i, UnilateralConstraint::JointLimit(l.clone())));
        contacts.chain(limits).collect()
    }

    /// Friction model of contact `i` as laid out in the problem.
    pub fn friction_model(&self, i: usize) -> FrictionModel {
        self.contacts[i].friction_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        constraints::BodyLink,
        rigidbody::RigidBody,
        types::{MassProperties, Transform},
    };
    use crate::dynamics::island::IslandManager;
    use crate::utils::{allocator::GeometryId, linalg::asymmetry};
    use approx::assert_relative_eq;

    fn contact(a: BodyId, b: BodyId, point: DVec3, normal: DVec3, model: FrictionModel) -> UnilateralConstraint {
        ContactConstraint::new(
            (GeometryId::from_index(0), BodyLink::rigid(a)),
            (GeometryId::from_index(1), BodyLink::rigid(b)),
            point,
            normal,
            0.0,
        )
        .with_friction(0.4, model)
        .into()
    }

    fn single_island(bodies: &Arena<BodyId, SuperBody>, constraints: &[UnilateralConstraint]) -> Island {
        let mut manager = IslandManager::new();
        manager.build_islands(bodies, constraints).unwrap();
        manager.into_islands().remove(0)
    }

    #[test]
    fn layout_orders_linearized_before_true_cones() {
        let mut bodies: Arena<BodyId, SuperBody> = Arena::new();
        let ground = bodies.insert(RigidBody::fixed(Transform::default()).into());
        let ball = bodies.insert(
            RigidBody::new(MassProperties::solid_sphere(0.5, 2.0))
                .with_velocity(DVec3::new(0.3, -1.0, 0.0), DVec3::new(0.0, 0.0, 0.7))
                .into(),
        );
        let constraints = vec![
            contact(ball, ground, DVec3::new(0.1, -0.5, 0.0), DVec3::Y, FrictionModel::ExactCone),
            contact(ball, ground, DVec3::new(-0.1, -0.5, 0.0), DVec3::Y, FrictionModel::LinearizedCone { edges: 6 }),
        ];
        let problem = ProblemData::assemble(&single_island(&bodies, &constraints), &bodies).unwrap();

        assert_eq!(problem.contact_indices, vec![1, 0]);
        assert_eq!((problem.n_lin_cone, problem.n_true_cone, problem.n_k_total), (1, 1, 3));
        assert_eq!(problem.n_vars, 2 + 3 + 3 + 2);
        assert_eq!(problem.range(VariableFamily::TrueCone), 8..10);
        assert_eq!(problem.n_gc, 6);
        assert!(problem.requires_nonlinear());
        assert!(asymmetry(&problem.coupling) < 1e-12);

        // Negated edges couple with the opposite sign.
        let e = problem.block(VariableFamily::Edge, VariableFamily::Edge);
        let ne = problem.block(VariableFamily::Edge, VariableFamily::NegatedEdge);
        assert_relative_eq!(e, -ne, epsilon = 1e-12);
        // Spin adds ω × r = (0.35, -0.07, 0) at the linearized contact.
        assert_relative_eq!(problem.velocity[0], -1.07, epsilon = 1e-12);
    }

    #[test]
    fn normal_block_matches_effective_mass() {
        let mut bodies: Arena<BodyId, SuperBody> = Arena::new();
        let a = bodies.insert(RigidBody::new(MassProperties::solid_sphere(1.0, 2.0)).into());
        let b = bodies.insert(
            RigidBody::new(MassProperties::solid_sphere(1.0, 4.0))
                .with_position(DVec3::new(0.0, -2.0, 0.0))
                .into(),
        );
        let constraints = vec![contact(a, b, DVec3::new(0.0, -1.0, 0.0), DVec3::Y, FrictionModel::LinearizedCone { edges: 4 })];
        let island = single_island(&bodies, &constraints);
        let problem = ProblemData::assemble(&island, &bodies).unwrap();
        let nn = problem.block(VariableFamily::Normal, VariableFamily::Normal);
        assert_relative_eq!(nn[(0, 0)], 0.5 + 0.25, epsilon = 1e-12);

        let position = ProblemData::assemble_position(&island, &bodies).unwrap();
        assert_eq!(position.n_vars, 1);
    }

    #[test]
    fn non_unit_normal_is_degenerate() {
        let mut bodies: Arena<BodyId, SuperBody> = Arena::new();
        let ground = bodies.insert(RigidBody::fixed(Transform::default()).into());
        let ball = bodies.insert(RigidBody::new(MassProperties::default()).into());
        let mut c = contact(ball, ground, DVec3::ZERO, DVec3::Y, FrictionModel::ExactCone);
        if let UnilateralConstraint::Contact(contact) = &mut c {
            contact.normal = DVec3::new(0.0, 2.0, 0.0);
        }
        let err = ProblemData::assemble(&single_island(&bodies, &[c]), &bodies).unwrap_err();
        assert!(matches!(err, ResolutionError::DegenerateConstraint { constraint: 0, .. }));
    }
}
