//! Task and volume orchestration engine.
//!
//! Turns a declarative [`skiff_model::TaskDefinition`] into one scheduled
//! unit per node, aggregates the cluster-reported state of those units back
//! into a single task status, and merges the live log streams of all pods
//! of a task into one ordered feed.
//!
//! The cluster itself sits behind the [`store::ResourceStore`] trait; the
//! engine owns no state of its own. Every status read is a fresh
//! re-aggregation of current cluster state, and labels on the created
//! objects are the only durable record of task and volume identity.

mod error;
pub use error::{EngineError, StoreError};

pub mod aggregate;
pub mod build;
pub mod identity;
pub mod logs;
pub mod store;

mod executor;
pub use executor::TaskExecutor;

mod util;
