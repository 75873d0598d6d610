//! Concrete temperature sensor sources.

pub mod w1_probe;

pub use w1_probe::W1Probe;
