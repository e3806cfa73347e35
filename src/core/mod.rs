// src/core/mod.rs

pub mod outcome;
pub mod policy;
pub mod selection;

pub use outcome::Outcome;
pub use policy::{HealthPolicy, Observation, MAX_COOLDOWN_SECS};
pub use selection::{LeastRecentlyUsedStrategy, SelectionStrategy};
