//! In-memory [`ResourceStore`] for tests and local development.
//!
//! Mirrors the cluster contract closely enough for engine-level tests:
//! selectors are evaluated client-side against labels, creating a unit
//! spawns one pod carrying the unit's labels, and log content is scripted
//! per pod.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use skiff_model::Selector;

use crate::error::StoreError;
use crate::store::{
    ClaimSnapshot, ClaimSpec, LogStream, PodSnapshot, ResourceStore, UnitSnapshot, UnitSpec,
};

struct PodEntry {
    snapshot: PodSnapshot,
    schedulable: bool,
    lines: Vec<String>,
}

#[derive(Default)]
struct Inner {
    units: Vec<UnitSnapshot>,
    claims: Vec<ClaimSnapshot>,
    pods: Vec<PodEntry>,
    /// Remaining successful unit creates before creates start failing.
    creates_before_failure: Option<usize>,
}

/// Shared, clonable in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make unit creates fail after `n` successes, for partial fan-out
    /// scenarios.
    pub fn fail_unit_creates_after(&self, n: usize) {
        self.inner.lock().unwrap().creates_before_failure = Some(n);
    }

    /// Overwrite the cluster-reported counters of a unit.
    pub fn set_unit_counters(&self, name: &str, succeeded: u32, failed: u32, active: u32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(unit) = inner.units.iter_mut().find(|u| u.name == name) {
            unit.succeeded = succeeded;
            unit.failed = failed;
            unit.active = active;
        }
    }

    /// Script the log lines served for a pod.
    pub fn set_pod_lines<I, S>(&self, pod: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.pods.iter_mut().find(|p| p.snapshot.name == pod) {
            entry.lines = lines.into_iter().map(Into::into).collect();
        }
    }

    /// Mark a pod as never becoming schedulable, so waits on it time out.
    pub fn set_pod_unschedulable(&self, pod: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.pods.iter_mut().find(|p| p.snapshot.name == pod) {
            entry.schedulable = false;
        }
    }

    /// Overwrite the cluster-reported phase of a claim.
    pub fn set_claim_phase(&self, name: &str, phase: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(claim) = inner.claims.iter_mut().find(|c| c.name == name) {
            claim.phase = phase.to_string();
        }
    }

    pub fn unit_names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.units.iter().map(|u| u.name.clone()).collect()
    }

    /// Name of the pod spawned for a unit.
    pub fn pod_name_for(unit: &str) -> String {
        format!("{unit}-pod")
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn create_unit(&self, spec: &UnitSpec) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(remaining) = inner.creates_before_failure {
            if remaining == 0 {
                return Err(StoreError::Api("unit create rejected".to_string()));
            }
            inner.creates_before_failure = Some(remaining - 1);
        }
        if inner.units.iter().any(|u| u.name == spec.name) {
            return Err(StoreError::AlreadyExists(spec.name.clone()));
        }

        inner.units.push(UnitSnapshot {
            name: spec.name.clone(),
            namespace: "default".to_string(),
            labels: spec.labels.clone(),
            annotations: spec.annotations.clone(),
            succeeded: 0,
            failed: 0,
            active: 0,
        });
        // One pod per unit, labeled like the unit, as the cluster would do.
        inner.pods.push(PodEntry {
            snapshot: PodSnapshot {
                name: Self::pod_name_for(&spec.name),
                labels: spec.labels.clone(),
            },
            schedulable: true,
            lines: Vec::new(),
        });
        Ok(())
    }

    async fn list_units(&self, selector: &Selector) -> Result<Vec<UnitSnapshot>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .units
            .iter()
            .filter(|u| selector.matches(&u.labels))
            .cloned()
            .collect())
    }

    async fn delete_unit(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.units.retain(|u| u.name != name);
        let pod = Self::pod_name_for(name);
        inner.pods.retain(|p| p.snapshot.name != pod);
        Ok(())
    }

    async fn create_claim(&self, spec: &ClaimSpec) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.claims.iter().any(|c| c.name == spec.name) {
            return Err(StoreError::AlreadyExists(spec.name.clone()));
        }
        inner.claims.push(ClaimSnapshot {
            name: spec.name.clone(),
            namespace: "default".to_string(),
            labels: spec.labels.clone(),
            annotations: spec.annotations.clone(),
            size: spec.size.clone(),
            storage_class: spec.storage_class.clone(),
            access_modes: spec.access_modes.clone(),
            phase: "Pending".to_string(),
        });
        Ok(())
    }

    async fn list_claims(&self, selector: &Selector) -> Result<Vec<ClaimSnapshot>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .claims
            .iter()
            .filter(|c| selector.matches(&c.labels))
            .cloned()
            .collect())
    }

    async fn delete_claim(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.claims.retain(|c| c.name != name);
        Ok(())
    }

    async fn list_pods(&self, selector: &Selector) -> Result<Vec<PodSnapshot>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .pods
            .iter()
            .filter(|p| selector.matches(&p.snapshot.labels))
            .map(|p| p.snapshot.clone())
            .collect())
    }

    async fn wait_pod_scheduled(&self, pod: &str, _timeout: Duration) -> Result<(), StoreError> {
        let schedulable = {
            let inner = self.inner.lock().unwrap();
            inner
                .pods
                .iter()
                .find(|p| p.snapshot.name == pod)
                .map(|p| p.schedulable)
        };
        match schedulable {
            Some(true) => Ok(()),
            // Unschedulable pods time out immediately instead of holding
            // tests for the full ceiling.
            Some(false) => Err(StoreError::WaitTimeout(format!("pod {pod} scheduled"))),
            None => Err(StoreError::Api(format!("pod not found: {pod}"))),
        }
    }

    async fn open_logs(&self, pod: &str) -> Result<Box<dyn LogStream>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let entry = inner
            .pods
            .iter()
            .find(|p| p.snapshot.name == pod)
            .ok_or_else(|| StoreError::Api(format!("pod not found: {pod}")))?;
        Ok(Box::new(MemoryLogStream {
            lines: entry.lines.clone().into(),
        }))
    }
}

struct MemoryLogStream {
    lines: VecDeque<String>,
}

#[async_trait]
impl LogStream for MemoryLogStream {
    async fn next_line(&mut self) -> Result<Option<String>, StoreError> {
        Ok(self.lines.pop_front())
    }
}
