//! Utility helpers: arenas and typed ids, math extensions, dense linear algebra, logging.

pub mod allocator;
pub mod linalg;
pub mod logging;
pub mod math;

pub use allocator::{Arena, ArenaId, BodyId, GenerationalId, GeometryId};
pub use logging::{PhaseTimings, ScopedTimer};
