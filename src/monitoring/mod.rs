// src/monitoring/mod.rs

pub mod prober;

pub use prober::HealthProber;
