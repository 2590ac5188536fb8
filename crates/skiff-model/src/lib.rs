//! Data model for the skiff task launcher.
//!
//! Pure serde types shared by the engine, the store backends and the HTTP
//! layer: task and volume definitions as submitted by users, the derived
//! status types reported back, and the label vocabulary that makes objects
//! in the cluster queryable.

mod domain;

pub use domain::*;
