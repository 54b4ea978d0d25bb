//! Minimal geometry layer: spheres and half-spaces with signed distance queries.

pub mod distance;
pub mod shapes;

pub use distance::{find_contacts, proximity, signed_distance, ContactPoint, PairwiseDistance, Proximity};
pub use shapes::{Geometry, Shape};
