//! Kubernetes backend for the skiff engine.
//!
//! Implements [`skiff_engine::store::ResourceStore`] over the cluster API:
//! scheduled units map to batch/v1 Jobs, storage claims to
//! PersistentVolumeClaims, and log streams to followed pod logs. Label
//! selectors are pushed down to the API server.

mod convert;
mod store;

pub use store::KubeStore;
