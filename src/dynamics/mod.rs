//! Constraint resolution: partitioning, problem assembly, impact and position solves.

pub mod apply;
pub mod impact;
pub mod island;
pub mod lcp;
pub mod problem;
pub mod stabilization;

pub use apply::{GeneralizedDisplacement, ImpulseAccumulator};
pub use impact::{ImpactMetrics, ImpactSolver, ImpactStrategy, IslandSolution};
pub use island::{approach_velocity, Island, IslandManager};
pub use lcp::LcpSolver;
pub use problem::{ProblemData, ProblemKind, VariableFamily, KAPPA_INACTIVE};
pub use stabilization::{ConfigurationSystem, PositionStabilizer, StabilizationReport};
