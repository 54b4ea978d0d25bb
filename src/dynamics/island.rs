use std::collections::{HashMap, HashSet};

use crate::{
    core::{body::SuperBody, constraints::UnilateralConstraint},
    error::{ResolutionError, Result},
    utils::allocator::{Arena, BodyId},
};

/// Constraints that share movable super bodies and must be solved together.
#[derive(Debug, Clone)]
pub struct Island {
    /// Positions of the constraints in the partitioned list, ascending.
    pub indices: Vec<usize>,
    pub constraints: Vec<UnilateralConstraint>,
    /// Movable super bodies touched by the island, sorted.
    pub bodies: Vec<BodyId>,
}

impl Island {
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Relative velocity along a constraint direction; negative when approaching.
pub fn approach_velocity(
    constraint: &UnilateralConstraint,
    bodies: &Arena<BodyId, SuperBody>,
) -> Result<f64> {
    match constraint {
        UnilateralConstraint::Contact(c) => {
            let a = bodies
                .get(c.body_a.body)
                .ok_or(ResolutionError::UnknownBody(c.body_a.body))?;
            let b = bodies
                .get(c.body_b.body)
                .ok_or(ResolutionError::UnknownBody(c.body_b.body))?;
            let va = a.point_velocity(c.body_a.link, c.point).ok_or(ResolutionError::UnknownLink {
                body: c.body_a.body,
                link: c.body_a.link,
            })?;
            let vb = b.point_velocity(c.body_b.link, c.point).ok_or(ResolutionError::UnknownLink {
                body: c.body_b.body,
                link: c.body_b.link,
            })?;
            Ok((va - vb).dot(c.normal))
        }
        UnilateralConstraint::JointLimit(l) => {
            let body = bodies
                .get(l.body)
                .ok_or(ResolutionError::UnknownBody(l.body))?;
            let rate = body.generalized_velocity().get(l.dof).copied().unwrap_or(0.0);
            Ok(l.bound.direction() * rate)
        }
    }
}

/// Partitions constraints into independently solvable islands.
pub struct IslandManager {
    islands: Vec<Island>,
    adjacency: HashMap<BodyId, Vec<usize>>,
}

impl Default for IslandManager {
    fn default() -> Self {
        Self::new()
    }
}

impl IslandManager {
    pub fn new() -> Self {
        Self {
            islands: Vec::new(),
            adjacency: HashMap::new(),
        }
    }

    /// Groups constraints under the "shares a movable super body" relation.
    ///
    /// Islands are ordered by their smallest constraint index and keep the
    /// input order inside, so membership does not depend on hash order.
    pub fn build_islands(
        &mut self,
        bodies: &Arena<BodyId, SuperBody>,
        constraints: &[UnilateralConstraint],
    ) -> Result<()> {
        self.islands.clear();
        self.adjacency.clear();

        for (index, constraint) in constraints.iter().enumerate() {
            if let UnilateralConstraint::Contact(c) = constraint {
                for side in [c.body_a, c.body_b] {
                    let body = bodies
                        .get(side.body)
                        .ok_or(ResolutionError::UnknownBody(side.body))?;
                    if !body.has_link(side.link) {
                        return Err(ResolutionError::degenerate(
                            index,
                            "contact link is not part of its body",
                        ));
                    }
                }
            }
            for body_id in constraint.super_bodies() {
                let body = bodies
                    .get(body_id)
                    .ok_or(ResolutionError::UnknownBody(body_id))?;
                if body.is_immovable() {
                    continue;
                }
                let entry = self.adjacency.entry(body_id).or_default();
                if entry.last() != Some(&index) {
                    entry.push(index);
                }
            }
        }

        let mut visited = HashSet::new();
        for start in 0..constraints.len() {
            if visited.contains(&start) {
                continue;
            }
            let mut indices = self.depth_first_collect(start, constraints, &mut visited);
            indices.sort_unstable();

            let mut island_bodies: Vec<BodyId> = indices
                .iter()
                .flat_map(|&i| constraints[i].super_bodies())
                .filter(|id| self.adjacency.contains_key(id))
                .collect();
            island_bodies.sort_unstable();
            island_bodies.dedup();

            self.islands.push(Island {
                constraints: indices.iter().map(|&i| constraints[i].clone()).collect(),
                indices,
                bodies: island_bodies,
            });
        }

        log::debug!(
            "partitioned {} constraints into {} islands",
            constraints.len(),
            self.islands.len()
        );
        Ok(())
    }

    fn depth_first_collect(
        &self,
        start: usize,
        constraints: &[UnilateralConstraint],
        visited: &mut HashSet<usize>,
    ) -> Vec<usize> {
        let mut stack = vec![start];
        let mut result = Vec::new();

        while let Some(node) = stack.pop() {
            if visited.insert(node) {
                result.push(node);
                for body_id in constraints[node].super_bodies() {
                    if let Some(neighbors) = self.adjacency.get(&body_id) {
                        stack.extend(neighbors.iter().copied());
                    }
                }
            }
        }

        result
    }

    /// Drops islands in which no constraint approaches faster than `tolerance`.
    pub fn remove_nonimpacting_islands(
        &mut self,
        bodies: &Arena<BodyId, SuperBody>,
        tolerance: f64,
    ) -> Result<()> {
        let mut kept = Vec::with_capacity(self.islands.len());
        for island in self.islands.drain(..) {
            let mut impacting = false;
            for constraint in &island.constraints {
                if approach_velocity(constraint, bodies)? < -tolerance {
                    impacting = true;
                    break;
                }
            }
            if impacting {
                kept.push(island);
            }
        }
        self.islands = kept;
        Ok(())
    }

    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    pub fn into_islands(self) -> Vec<Island> {
        self.islands
    }
}
