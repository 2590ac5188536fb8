//! Boundary to the orchestration cluster.
//!
//! The engine only ever creates, lists and deletes objects by label and
//! reads pod logs; that narrow contract is [`ResourceStore`]. The
//! production backend lives in `skiff-kube`; [`memory::MemoryStore`] backs
//! tests and local runs.

pub mod memory;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use skiff_model::Selector;

use crate::error::StoreError;

/// Resource constraints of one scheduled unit.
///
/// Quantities are verbatim cluster strings, applied to both request and
/// limit. `accelerator_count` becomes an accelerator-count limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitResources {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub accelerator_count: Option<u32>,
}

/// One volume attached to a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAttachment {
    /// User-facing volume name, also used as the in-pod volume handle.
    pub volume_name: String,
    /// Resolved name of the backing storage claim.
    pub claim_name: String,
    pub mount_path: String,
}

/// Specification of one scheduled unit, ready to be created.
///
/// Labels and annotations are the only durable record of the unit's
/// identity; losing them loses the ability to query or stop the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub image: String,
    /// Shell script run as the unit's single container command.
    pub command: String,
    pub env: Vec<(String, String)>,
    pub resources: UnitResources,
    pub mounts: Vec<VolumeAttachment>,
}

/// Specification of one storage claim, ready to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSpec {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub size: String,
    pub storage_class: Option<String>,
    pub access_modes: Vec<String>,
}

/// Cluster-reported state of one scheduled unit at list time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSnapshot {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// Completion counter; > 0 means the unit succeeded.
    pub succeeded: u32,
    /// Failure counter; > 0 means the unit failed.
    pub failed: u32,
    /// Count of actively running pods.
    pub active: u32,
}

impl UnitSnapshot {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Cluster-reported state of one storage claim at list time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSnapshot {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub size: String,
    pub storage_class: Option<String>,
    pub access_modes: Vec<String>,
    /// Cluster-reported phase string, passed through verbatim.
    pub phase: String,
}

impl ClaimSnapshot {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// A pod discovered for log streaming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodSnapshot {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl PodSnapshot {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// A followed, line-based log source for one pod.
///
/// `next_line` blocks until the next line arrives and returns `None` once
/// the pod's container has exited and the stream is drained.
#[async_trait]
pub trait LogStream: Send {
    async fn next_line(&mut self) -> Result<Option<String>, StoreError>;
}

/// Narrow contract with the orchestration cluster.
///
/// Creates are not idempotent: a duplicate name fails. Deletes are
/// asynchronous; success means "deletion accepted", not "fully removed".
/// List selectors are exact-match conjunctions, evaluated server-side
/// where the backend supports it.
#[async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    async fn create_unit(&self, spec: &UnitSpec) -> Result<(), StoreError>;
    async fn list_units(&self, selector: &Selector) -> Result<Vec<UnitSnapshot>, StoreError>;
    async fn delete_unit(&self, name: &str) -> Result<(), StoreError>;

    async fn create_claim(&self, spec: &ClaimSpec) -> Result<(), StoreError>;
    async fn list_claims(&self, selector: &Selector) -> Result<Vec<ClaimSnapshot>, StoreError>;
    async fn delete_claim(&self, name: &str) -> Result<(), StoreError>;

    async fn list_pods(&self, selector: &Selector) -> Result<Vec<PodSnapshot>, StoreError>;

    /// Block until the pod has been scheduled onto a node, or fail with
    /// [`StoreError::WaitTimeout`] once `timeout` elapses.
    async fn wait_pod_scheduled(&self, pod: &str, timeout: Duration) -> Result<(), StoreError>;

    /// Open a followed log stream for the pod.
    async fn open_logs(&self, pod: &str) -> Result<Box<dyn LogStream>, StoreError>;
}
