use super::constraints::LimitBound;
use super::types::Transform;
use glam::{DMat3, DQuat, DVec3};
use nalgebra::{DMatrix, DVector};

/// Type of joint connecting a link to its parent in reduced coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointType {
    /// 1-DOF rotation about `axis` (joint frame).
    Revolute { axis: DVec3 },
    /// 1-DOF translation along `axis` (joint frame).
    Prismatic { axis: DVec3 },
    /// 0-DOF rigid connection.
    Fixed,
}

impl JointType {
    pub fn dofs(&self) -> usize {
        match self {
            JointType::Revolute { .. } | JointType::Prismatic { .. } => 1,
            JointType::Fixed => 0,
        }
    }

    /// Local transform across the joint for the joint coordinates `q`.
    pub fn transform(&self, q: &[f64]) -> Transform {
        match self {
            JointType::Revolute { axis } => Transform {
                rotation: DQuat::from_axis_angle(axis.normalize(), q[0]),
                ..Transform::default()
            },
            JointType::Prismatic { axis } => Transform::from_position(axis.normalize() * q[0]),
            JointType::Fixed => Transform::default(),
        }
    }
}

/// Position range of a 1-DOF joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub lower: f64,
    pub upper: f64,
}

/// A single node in the articulated body tree.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    /// Index of the parent link; `None` attaches the link to the fixed base.
    pub parent_idx: Option<usize>,
    pub joint_type: JointType,
    /// Offset of the joint coordinates in the multibody state vectors.
    pub q_offset: usize,
    /// Static transform from the parent link frame to this link's joint frame.
    pub parent_to_joint: Transform,
    pub mass: f64,
    /// Center of mass in the link frame.
    pub com_offset: DVec3,
    /// Rotational inertia about the center of mass, link frame.
    pub inertia: DMat3,
    pub limits: Option<JointLimits>,
    /// Largest Coulomb friction impulse the joint can transmit per impact.
    pub joint_friction: f64,
}

impl Link {
    pub fn new(name: &str, parent: Option<usize>, joint: JointType) -> Self {
        Self {
            name: name.into(),
            parent_idx: parent,
            joint_type: joint,
            q_offset: 0,
            parent_to_joint: Transform::default(),
            mass: 1.0,
            com_offset: DVec3::ZERO,
            inertia: DMat3::IDENTITY,
            limits: None,
            joint_friction: 0.0,
        }
    }

    pub fn with_limits(mut self, lower: f64, upper: f64) -> Self {
        self.limits = Some(JointLimits { lower, upper });
        self
    }
}

/// Bilateral velocity constraint `Σ coefficients[i] · dq[i] = 0` enforced by
/// an explicit multiplier (loop closures, gear couplings).
#[derive(Debug, Clone, PartialEq)]
pub struct ExplicitConstraint {
    pub coefficients: Vec<f64>,
}

/// Fixed-base tree of links in reduced coordinates.
#[derive(Debug, Clone)]
pub struct Multibody {
    pub base: Transform,
    /// Links ordered such that a parent always appears before its children.
    pub links: Vec<Link>,
    pub total_dofs: usize,
    /// Generalized positions.
    pub q: Vec<f64>,
    /// Generalized velocities.
    pub dq: Vec<f64>,
    pub explicit_constraints: Vec<ExplicitConstraint>,
    /// Model joint friction as extra solver unknowns (forces the nonlinear solve).
    pub use_advanced_friction_model: bool,
}

/// Per-link world frames: the joint frame and the link frame after the joint motion.
#[derive(Debug, Clone, Copy)]
struct LinkFrames {
    joint: Transform,
    link: Transform,
}

impl Multibody {
    pub fn new(base: Transform) -> Self {
        Self {
            base,
            links: Vec::new(),
            total_dofs: 0,
            q: Vec::new(),
            dq: Vec::new(),
            explicit_constraints: Vec::new(),
            use_advanced_friction_model: false,
        }
    }

    /// Adds a link and allocates its DOFs.
    pub fn add_link(&mut self, mut link: Link) -> usize {
        let idx = self.links.len();
        link.q_offset = self.total_dofs;
        self.total_dofs += link.joint_type.dofs();
        self.q.resize(self.total_dofs, 0.0);
        self.dq.resize(self.total_dofs, 0.0);
        self.links.push(link);
        idx
    }

    pub fn add_explicit_constraint(&mut self, coefficients: Vec<f64>) {
        let mut coefficients = coefficients;
        coefficients.resize(self.total_dofs, 0.0);
        self.explicit_constraints.push(ExplicitConstraint { coefficients });
    }

    fn frames(&self) -> Vec<LinkFrames> {
        let mut frames: Vec<LinkFrames> = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let parent = link
                .parent_idx
                .and_then(|p| frames.get(p))
                .map(|f| f.link)
                .unwrap_or(self.base);
            let joint = parent.combine(&link.parent_to_joint);
            let dofs = link.joint_type.dofs();
            let q = &self.q[link.q_offset..link.q_offset + dofs];
            frames.push(LinkFrames {
                joint,
                link: joint.combine(&link.joint_type.transform(q)),
            });
        }
        frames
    }

    pub fn link_transform(&self, link: usize) -> Option<Transform> {
        self.frames().get(link).map(|f| f.link)
    }

    /// Link and its ancestors up to the base; empty for an index past the last link.
    fn chain(&self, link: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut next = Some(link).filter(|&i| i < self.links.len());
        while let Some(i) = next {
            chain.push(i);
            next = self.links[i].parent_idx.filter(|&p| p < self.links.len());
        }
        chain
    }

    fn jacobians_with(&self, frames: &[LinkFrames], link: usize, point: DVec3) -> (DMatrix<f64>, DMatrix<f64>) {
        let mut linear = DMatrix::zeros(3, self.total_dofs);
        let mut angular = DMatrix::zeros(3, self.total_dofs);
        for j in self.chain(link) {
            let frame = frames[j].joint;
            let col = self.links[j].q_offset;
            match self.links[j].joint_type {
                JointType::Revolute { axis } => {
                    let a = frame.transform_vector(axis.normalize());
                    let v = a.cross(point - frame.position);
                    for r in 0..3 {
                        linear[(r, col)] = v[r];
                        angular[(r, col)] = a[r];
                    }
                }
                JointType::Prismatic { axis } => {
                    let a = frame.transform_vector(axis.normalize());
                    for r in 0..3 {
                        linear[(r, col)] = a[r];
                    }
                }
                JointType::Fixed => {}
            }
        }
        (linear, angular)
    }

    /// Linear and angular velocity Jacobians (3 × dofs each) of a world point on `link`.
    pub fn point_jacobians(&self, link: usize, point: DVec3) -> (DMatrix<f64>, DMatrix<f64>) {
        self.jacobians_with(&self.frames(), link, point)
    }

    pub fn point_velocity(&self, link: usize, point: DVec3) -> DVec3 {
        let (linear, _) = self.point_jacobians(link, point);
        let v = linear * DVector::from_column_slice(&self.dq);
        DVec3::new(v[0], v[1], v[2])
    }

    /// Generalized force of a wrench `(force, torque)` acting at `point` on `link`.
    pub fn generalized_force(&self, link: usize, force: DVec3, torque: DVec3, point: DVec3) -> DVector<f64> {
        let (linear, angular) = self.point_jacobians(link, point);
        let f = nalgebra::Vector3::new(force.x, force.y, force.z);
        let t = nalgebra::Vector3::new(torque.x, torque.y, torque.z);
        linear.transpose() * f + angular.transpose() * t
    }

    /// Joint-space inertia matrix, summed link by link from the center-of-mass Jacobians.
    pub fn generalized_inertia(&self) -> DMatrix<f64> {
        let frames = self.frames();
        let mut m = DMatrix::zeros(self.total_dofs, self.total_dofs);
        for (i, link) in self.links.iter().enumerate() {
            let com = frames[i].link.transform_point(link.com_offset);
            let (jv, jw) = self.jacobians_with(&frames, i, com);
            let r = DMat3::from_quat(frames[i].link.rotation);
            let inertia = r * link.inertia * r.transpose();
            let inertia = DMatrix::from_fn(3, 3, |row, col| inertia.col(col)[row]);
            m += jv.transpose() * &jv * link.mass + jw.transpose() * inertia * &jw;
        }
        m
    }

    /// Inverse of the joint-space inertia, `None` when it is not positive definite.
    pub fn inverse_generalized_inertia(&self) -> Option<DMatrix<f64>> {
        if self.total_dofs == 0 {
            return Some(DMatrix::zeros(0, 0));
        }
        self.generalized_inertia().cholesky().map(|c| c.inverse())
    }

    pub fn kinetic_energy(&self) -> f64 {
        let dq = DVector::from_column_slice(&self.dq);
        0.5 * dq.dot(&(self.generalized_inertia() * &dq))
    }

    /// Current slack of every joint bound: `(dof, bound, slack)`, negative slack when violated.
    pub fn limit_slacks(&self) -> Vec<(usize, LimitBound, f64)> {
        let mut slacks = Vec::new();
        for link in &self.links {
            if link.joint_type.dofs() != 1 {
                continue;
            }
            if let Some(limits) = link.limits {
                let q = self.q[link.q_offset];
                slacks.push((link.q_offset, LimitBound::Lower, q - limits.lower));
                slacks.push((link.q_offset, LimitBound::Upper, limits.upper - q));
            }
        }
        slacks
    }

    /// Worst joint limit violation (zero when every joint is inside its range).
    pub fn limit_violation(&self) -> f64 {
        self.limit_slacks()
            .into_iter()
            .fold(0.0_f64, |worst, (_, _, slack)| worst.max(-slack))
    }

    pub fn num_constraint_eqns_explicit(&self) -> usize {
        self.explicit_constraints.len()
    }

    /// Stacked explicit constraint rows (`num_constraint_eqns_explicit × dofs`).
    pub fn explicit_constraint_jacobian(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.explicit_constraints.len(), self.total_dofs, |r, c| {
            self.explicit_constraints[r].coefficients.get(c).copied().unwrap_or(0.0)
        })
    }

    /// Joint friction unknowns introduced by the advanced friction model.
    pub fn num_joint_friction_dofs(&self) -> usize {
        if self.use_advanced_friction_model {
            self.total_dofs
        } else {
            0
        }
    }

    /// Friction impulse bound of every dof.
    pub fn joint_friction_bounds(&self) -> Vec<f64> {
        let mut bounds = vec![0.0; self.total_dofs];
        for link in &self.links {
            for k in 0..link.joint_type.dofs() {
                bounds[link.q_offset + k] = link.joint_friction;
            }
        }
        bounds
    }
}
