//! Closest-point queries between posed geometries.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::shapes::{Geometry, Shape};
use crate::core::types::Transform;
use crate::utils::allocator::GeometryId;

/// Closest features of two geometries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    /// Signed distance, negative when the geometries overlap.
    pub distance: f64,
    pub point_a: DVec3,
    pub point_b: DVec3,
    /// Unit direction from B into A.
    pub normal: DVec3,
}

/// Contact point candidate between two geometries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub point: DVec3,
    pub normal: DVec3,
    pub distance: f64,
}

/// Cached signed distance of one geometry pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairwiseDistance {
    pub geometry_a: GeometryId,
    pub geometry_b: GeometryId,
    pub distance: f64,
    pub point_a: DVec3,
    pub point_b: DVec3,
}

fn sphere_sphere(ca: DVec3, ra: f64, cb: DVec3, rb: f64) -> Proximity {
    let delta = ca - cb;
    let len = delta.length();
    let normal = if len > f64::EPSILON { delta / len } else { DVec3::Y };
    Proximity {
        distance: len - ra - rb,
        point_a: ca - normal * ra,
        point_b: cb + normal * rb,
        normal,
    }
}

fn sphere_plane(center: DVec3, radius: f64, origin: DVec3, normal: DVec3) -> Proximity {
    let height = normal.dot(center - origin);
    Proximity {
        distance: height - radius,
        point_a: center - normal * radius,
        point_b: center - normal * height,
        normal,
    }
}

impl Proximity {
    fn swapped(self) -> Self {
        Self {
            distance: self.distance,
            point_a: self.point_b,
            point_b: self.point_a,
            normal: -self.normal,
        }
    }
}

/// Closest features of `a` and `b` at the given world poses; `None` for
/// unsupported pairs (two half-spaces).
pub fn proximity(a: &Geometry, pose_a: &Transform, b: &Geometry, pose_b: &Transform) -> Option<Proximity> {
    match (a.shape, b.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            Some(sphere_sphere(pose_a.position, ra, pose_b.position, rb))
        }
        (Shape::Sphere { radius }, Shape::HalfSpace { normal }) => Some(sphere_plane(
            pose_a.position,
            radius,
            pose_b.position,
            pose_b.transform_vector(normal),
        )),
        (Shape::HalfSpace { normal }, Shape::Sphere { radius }) => Some(
            sphere_plane(
                pose_b.position,
                radius,
                pose_a.position,
                pose_a.transform_vector(normal),
            )
            .swapped(),
        ),
        (Shape::HalfSpace { .. }, Shape::HalfSpace { .. }) => None,
    }
}

/// Signed distance with the closest points on `a` and `b`.
pub fn signed_distance(
    a: &Geometry,
    pose_a: &Transform,
    b: &Geometry,
    pose_b: &Transform,
) -> Option<(f64, DVec3, DVec3)> {
    proximity(a, pose_a, b, pose_b).map(|p| (p.distance, p.point_a, p.point_b))
}

/// Contact points between `a` and `b`; a single point midway between the closest features.
pub fn find_contacts(a: &Geometry, pose_a: &Transform, b: &Geometry, pose_b: &Transform) -> Vec<ContactPoint> {
    proximity(a, pose_a, b, pose_b)
        .map(|p| ContactPoint {
            point: (p.point_a + p.point_b) * 0.5,
            normal: p.normal,
            distance: p.distance,
        })
        .into_iter()
        .collect()
}
