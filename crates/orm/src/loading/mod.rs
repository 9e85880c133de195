//! Eager loading: path planning, the per-call identity map and the loader

pub mod eager;
pub mod identity;
pub mod planner;

pub use eager::{EagerLoader, LoadStats};
pub use identity::IdentityMap;
pub use planner::{LoadPlan, PlanNode};

pub(crate) use eager::wire;
