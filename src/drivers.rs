//! Concrete actuator drivers.

pub mod kasa;

pub use kasa::KasaDriver;
