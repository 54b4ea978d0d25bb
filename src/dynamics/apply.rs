//! Deferred application of generalized impulses and displacements.

use std::collections::BTreeMap;

use nalgebra::DVector;

use crate::{
    core::body::{GeneralizedCoordinateType, SuperBody},
    error::{ResolutionError, Result},
    utils::allocator::{Arena, BodyId},
};

/// Per-body sum of generalized impulses, applied in one pass once every
/// island of the epoch has been solved.
#[derive(Debug, Default, Clone)]
pub struct ImpulseAccumulator {
    impulses: BTreeMap<BodyId, DVector<f64>>,
}

impl ImpulseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, body: BodyId, impulse: &DVector<f64>) {
        self.impulses
            .entry(body)
            .and_modify(|acc| *acc += impulse)
            .or_insert_with(|| impulse.clone());
    }

    pub fn extend<'a>(&mut self, impulses: impl IntoIterator<Item = (&'a BodyId, &'a DVector<f64>)>) {
        for (body, impulse) in impulses {
            self.add(*body, impulse);
        }
    }

    pub fn get(&self, body: BodyId) -> Option<&DVector<f64>> {
        self.impulses.get(&body)
    }

    pub fn len(&self) -> usize {
        self.impulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impulses.is_empty()
    }

    /// Applies every accumulated impulse. Every velocity change is computed
    /// before the first body is modified, so an unknown id or a singular
    /// inertia leaves the world untouched.
    pub fn apply(self, bodies: &mut Arena<BodyId, SuperBody>) -> Result<usize> {
        let mut changes = Vec::with_capacity(self.impulses.len());
        for (id, impulse) in &self.impulses {
            let body = bodies.get(*id).ok_or(ResolutionError::UnknownBody(*id))?;
            let delta = body
                .velocity_change(impulse)
                .ok_or(ResolutionError::SingularInertia { body: *id })?;
            changes.push((*id, delta));
        }
        let count = changes.len();
        for (id, delta) in changes {
            if let Some(body) = bodies.get_mut(id) {
                body.add_generalized_velocity(&delta);
            }
        }
        Ok(count)
    }
}

/// Global generalized displacement over a fixed set of bodies, laid out by a
/// body → spatial offset map built once per stabilization call.
#[derive(Debug, Clone)]
pub struct GeneralizedDisplacement {
    offsets: BTreeMap<BodyId, (usize, usize)>,
    pub delta: DVector<f64>,
}

impl GeneralizedDisplacement {
    pub fn new(bodies: &Arena<BodyId, SuperBody>) -> Self {
        let mut offsets = BTreeMap::new();
        let mut total = 0;
        for (id, body) in bodies.iter() {
            if body.is_immovable() {
                continue;
            }
            let n = body.num_generalized_coordinates(GeneralizedCoordinateType::Spatial);
            offsets.insert(id, (total, n));
            total += n;
        }
        Self {
            offsets,
            delta: DVector::zeros(total),
        }
    }

    pub fn clear(&mut self) {
        self.delta.fill(0.0);
    }

    pub fn offset(&self, body: BodyId) -> Option<(usize, usize)> {
        self.offsets.get(&body).copied()
    }

    /// Adds a body's displacement into the global vector.
    pub fn add(&mut self, body: BodyId, dq: &DVector<f64>) {
        if let Some((offset, n)) = self.offset(body) {
            let mut slice = self.delta.rows_mut(offset, n);
            slice += dq;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.delta.iter().all(|x| *x == 0.0)
    }

    /// Euler coordinates of every displaced body, keyed by id.
    pub fn snapshot(&self, bodies: &Arena<BodyId, SuperBody>) -> BTreeMap<BodyId, DVector<f64>> {
        self.offsets
            .keys()
            .filter_map(|id| bodies.get(*id).map(|b| (*id, b.generalized_coordinates())))
            .collect()
    }

    /// Sets each body to `base + step · delta`.
    pub fn apply(
        &self,
        bodies: &mut Arena<BodyId, SuperBody>,
        base: &BTreeMap<BodyId, DVector<f64>>,
        step: f64,
    ) {
        for (id, &(offset, n)) in &self.offsets {
            let (Some(body), Some(q0)) = (bodies.get_mut(*id), base.get(id)) else {
                continue;
            };
            let dq = self.delta.rows(offset, n) * step;
            let q = body.displaced_coordinates(q0, &dq);
            body.set_generalized_coordinates(&q);
        }
    }

    /// Restores the configurations captured by [`GeneralizedDisplacement::snapshot`].
    pub fn restore(bodies: &mut Arena<BodyId, SuperBody>, base: &BTreeMap<BodyId, DVector<f64>>) {
        for (id, q) in base {
            if let Some(body) = bodies.get_mut(*id) {
                body.set_generalized_coordinates(q);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{rigidbody::RigidBody, types::{MassProperties, Transform}};
    use glam::DVec3;

    #[test]
    fn accumulated_impulses_add_up() {
        let mut bodies: Arena<BodyId, SuperBody> = Arena::new();
        let id = bodies.insert(RigidBody::new(MassProperties::solid_sphere(1.0, 2.0)).into());

        let mut acc = ImpulseAccumulator::new();
        let mut j = DVector::zeros(6);
        j[1] = 1.0;
        acc.add(id, &j);
        acc.add(id, &j);
        assert_eq!(acc.apply(&mut bodies).unwrap(), 1);

        let v = bodies.get(id).unwrap().as_rigid().unwrap().velocity.linear;
        assert!((v - DVec3::new(0.0, 1.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn unknown_body_aborts_before_any_change() {
        let mut bodies: Arena<BodyId, SuperBody> = Arena::new();
        let id = bodies.insert(RigidBody::new(MassProperties::default()).into());
        let ghost = bodies.insert(RigidBody::new(MassProperties::default()).into());
        bodies.remove(ghost);

        let mut acc = ImpulseAccumulator::new();
        acc.add(id, &DVector::from_element(6, 1.0));
        acc.add(ghost, &DVector::from_element(6, 1.0));
        assert!(acc.apply(&mut bodies).is_err());
        assert_eq!(bodies.get(id).unwrap().kinetic_energy(), 0.0);
    }

    #[test]
    fn displacement_skips_static_bodies_and_restores() {
        let mut bodies: Arena<BodyId, SuperBody> = Arena::new();
        bodies.insert(RigidBody::fixed(Transform::default()).into());
        let ball = bodies.insert(RigidBody::new(MassProperties::default()).into());

        let mut disp = GeneralizedDisplacement::new(&bodies);
        assert_eq!(disp.delta.len(), 6);
        let mut dq = DVector::zeros(6);
        dq[1] = 2.0;
        disp.add(ball, &dq);

        let base = disp.snapshot(&bodies);
        disp.apply(&mut bodies, &base, 0.5);
        let y = bodies.get(ball).unwrap().as_rigid().unwrap().transform.position.y;
        assert!((y - 1.0).abs() < 1e-12);

        GeneralizedDisplacement::restore(&mut bodies, &base);
        let y = bodies.get(ball).unwrap().as_rigid().unwrap().transform.position.y;
        assert_eq!(y, 0.0);
    }

    #[test]
    fn singular_body_aborts_before_any_change() {
        let mut bodies: Arena<BodyId, SuperBody> = Arena::new();
        let healthy = bodies.insert(RigidBody::new(MassProperties::default()).into());
        let point_mass = bodies.insert(
            RigidBody::new(MassProperties {
                mass: 1.0,
                inertia: glam::DMat3::ZERO,
            })
            .into(),
        );
        // Lower id first, so the healthy body would be touched before the failure.
        assert!(healthy < point_mass);

        let mut acc = ImpulseAccumulator::new();
        acc.add(healthy, &DVector::from_element(6, 1.0));
        acc.add(point_mass, &DVector::from_element(6, 1.0));
        let err = acc.apply(&mut bodies).unwrap_err();
        assert!(matches!(err, ResolutionError::SingularInertia { body } if body == point_mass));
        assert_eq!(bodies.get(healthy).unwrap().kinetic_energy(), 0.0);
    }
}
