//! Upward-facing facade: submission, lifecycle and log operations over a
//! [`ResourceStore`].
//!
//! The executor holds no task or volume state. Submission, listing and
//! status are plain request/response calls against the store's current
//! snapshot; the only concurrency lives in the log fan-in.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use skiff_model::{
    LABEL_TASK_ID, LABEL_USERNAME, LABEL_VOLUME_NAME, Selector, TASK_KIND_LABEL, TaskDefinition,
    TaskId, TaskStatus, VOLUME_KIND_LABEL, VolumeDefinition, VolumeId, VolumeStatus,
};

use crate::aggregate;
use crate::build;
use crate::error::EngineError;
use crate::identity;
use crate::logs::{self, LogFeed};
use crate::store::{ResourceStore, UnitSnapshot};
use crate::util::now_rfc3339;

pub struct TaskExecutor<S> {
    store: Arc<S>,
}

impl<S: ResourceStore> TaskExecutor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Submit a task: validate, fan out one unit per node, create each.
    ///
    /// Creation is sequential and has no transactional guarantee: when a
    /// later create fails the earlier units stay live in the cluster and
    /// the submission as a whole fails. Callers must treat partial
    /// submission as an observable outcome.
    pub async fn submit(&self, task: &TaskDefinition, owner: &str) -> Result<TaskId, EngineError> {
        build::validate(task)?;

        let task_id = TaskId::generate();
        let resolved = self.resolve_claims(task, owner).await?;
        let created_at = now_rfc3339();
        let units = build::build_units(task, &task_id, owner, &resolved, &created_at)?;

        for (created, unit) in units.iter().enumerate() {
            if let Err(err) = self.store.create_unit(unit).await {
                warn!(
                    target: "skiff.engine",
                    task_id = %task_id,
                    created,
                    total = units.len(),
                    "submission aborted mid fan-out; already-created units are not rolled back"
                );
                return Err(err.into());
            }
        }

        info!(
            target: "skiff.engine",
            task_id = %task_id,
            num_nodes = task.num_nodes,
            owner = %identity::sanitize(owner),
            "task submitted"
        );
        Ok(task_id)
    }

    /// Stop a task by deleting all of its units. `false` when no unit
    /// matches the id for this owner.
    pub async fn stop(&self, task_id: &TaskId, owner: &str) -> Result<bool, EngineError> {
        let units = self
            .store
            .list_units(&identity::task_scope(task_id, owner))
            .await?;
        if units.is_empty() {
            return Ok(false);
        }
        for unit in &units {
            self.store.delete_unit(&unit.name).await?;
        }
        info!(target: "skiff.engine", task_id = %task_id, units = units.len(), "task stopped");
        Ok(true)
    }

    /// Stop every task of one owner, or of all owners when `owner` is
    /// `None`. Returns the number of tasks stopped.
    pub async fn stop_all(&self, owner: Option<&str>) -> Result<usize, EngineError> {
        let units = self
            .store
            .list_units(&identity::owned_by(TASK_KIND_LABEL, owner))
            .await?;

        let mut task_ids: Vec<&str> = Vec::new();
        for unit in &units {
            let id = unit.label(LABEL_TASK_ID).unwrap_or("unknown");
            if !task_ids.contains(&id) {
                task_ids.push(id);
            }
            self.store.delete_unit(&unit.name).await?;
        }
        info!(target: "skiff.engine", tasks = task_ids.len(), units = units.len(), "stopped all tasks");
        Ok(task_ids.len())
    }

    /// All tasks of one owner (or of everyone), aggregated per task id.
    pub async fn list(&self, owner: Option<&str>) -> Result<Vec<TaskStatus>, EngineError> {
        let units = self
            .store
            .list_units(&identity::owned_by(TASK_KIND_LABEL, owner))
            .await?;

        let mut by_task: BTreeMap<String, Vec<UnitSnapshot>> = BTreeMap::new();
        for unit in units {
            let id = unit.label(LABEL_TASK_ID).unwrap_or("unknown").to_string();
            by_task.entry(id).or_default().push(unit);
        }

        Ok(by_task
            .values()
            .filter_map(|units| aggregate::aggregate(units))
            .collect())
    }

    /// Status of one task, freshly aggregated; `None` when no unit matches
    /// the id for this owner.
    pub async fn status(
        &self,
        task_id: &TaskId,
        owner: &str,
    ) -> Result<Option<TaskStatus>, EngineError> {
        let units = self
            .store
            .list_units(&identity::task_scope(task_id, owner))
            .await?;
        Ok(aggregate::aggregate(&units))
    }

    /// Merged live log feed over all pods of a task. A task with no
    /// discoverable pods yields an immediately-exhausted feed.
    pub async fn tail_logs(&self, task_id: &TaskId, owner: &str) -> Result<LogFeed, EngineError> {
        let pods = self
            .store
            .list_pods(&identity::task_scope(task_id, owner))
            .await?;
        Ok(logs::fan_in(Arc::clone(&self.store), pods))
    }

    pub async fn create_volume(
        &self,
        def: &VolumeDefinition,
        owner: &str,
    ) -> Result<VolumeId, EngineError> {
        if def.name.trim().is_empty() || def.size.trim().is_empty() {
            return Err(EngineError::Validation(
                "volume name and size are required".into(),
            ));
        }

        let volume_id = VolumeId::generate();
        let claim = build::build_claim(def, &volume_id, owner, &now_rfc3339());
        self.store.create_claim(&claim).await?;

        info!(
            target: "skiff.engine",
            volume_id = %volume_id,
            claim = %claim.name,
            "volume created"
        );
        Ok(volume_id)
    }

    pub async fn delete_volume(
        &self,
        volume_id: &VolumeId,
        owner: &str,
    ) -> Result<bool, EngineError> {
        let claims = self
            .store
            .list_claims(&identity::volume_scope(volume_id, owner))
            .await?;
        if claims.is_empty() {
            return Ok(false);
        }
        for claim in &claims {
            self.store.delete_claim(&claim.name).await?;
        }
        Ok(true)
    }

    pub async fn list_volumes(&self, owner: Option<&str>) -> Result<Vec<VolumeStatus>, EngineError> {
        let claims = self
            .store
            .list_claims(&identity::owned_by(VOLUME_KIND_LABEL, owner))
            .await?;
        Ok(claims.iter().map(aggregate::claim_status).collect())
    }

    pub async fn volume_status(
        &self,
        volume_id: &VolumeId,
        owner: &str,
    ) -> Result<Option<VolumeStatus>, EngineError> {
        let claims = self
            .store
            .list_claims(&identity::volume_scope(volume_id, owner))
            .await?;
        Ok(claims.first().map(aggregate::claim_status))
    }

    /// Owner-scoped lookup of the claim names behind the task's volume
    /// names. Names with no labeled claim are left out; the builder then
    /// falls back to the literal name.
    async fn resolve_claims(
        &self,
        task: &TaskDefinition,
        owner: &str,
    ) -> Result<BTreeMap<String, String>, EngineError> {
        let mut resolved = BTreeMap::new();
        for volume_name in task.volumes.values() {
            let selector = Selector::new()
                .and(VOLUME_KIND_LABEL, "true")
                .and(LABEL_VOLUME_NAME, volume_name.clone())
                .and(LABEL_USERNAME, identity::sanitize(owner));
            if let Some(claim) = self.store.list_claims(&selector).await?.first() {
                resolved.insert(volume_name.clone(), claim.name.clone());
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use skiff_model::{LABEL_NODE_IDX, TaskState};

    fn executor() -> (TaskExecutor<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (TaskExecutor::new(Arc::clone(&store)), store)
    }

    fn multi_node_task(name: &str, n: u32) -> TaskDefinition {
        let mut task = TaskDefinition::from_run("echo hi");
        task.name = Some(name.into());
        task.num_nodes = n;
        task
    }

    #[tokio::test]
    async fn submit_fans_out_n_units_with_shared_id() {
        let (exec, store) = executor();
        let task_id = exec.submit(&multi_node_task("t", 3), "alice").await.unwrap();

        let units = store
            .list_units(&identity::task_scope(&task_id, "alice"))
            .await
            .unwrap();
        assert_eq!(units.len(), 3);

        let mut indices: Vec<&str> = units
            .iter()
            .map(|u| u.label(LABEL_NODE_IDX).unwrap())
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, vec!["0", "1", "2"]);
    }

    #[tokio::test]
    async fn status_lifecycle_pending_running_completed() {
        let (exec, store) = executor();
        let task = TaskDefinition::from_run("echo hi");
        let task_id = exec.submit(&task, "alice").await.unwrap();
        let unit = store.unit_names().pop().unwrap();

        let status = exec.status(&task_id, "alice").await.unwrap().unwrap();
        assert_eq!(status.state, TaskState::Pending);

        store.set_unit_counters(&unit, 0, 0, 1);
        let status = exec.status(&task_id, "alice").await.unwrap().unwrap();
        assert_eq!(status.state, TaskState::Running);

        store.set_unit_counters(&unit, 1, 0, 0);
        let status = exec.status(&task_id, "alice").await.unwrap().unwrap();
        assert_eq!(status.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn status_is_none_for_wrong_owner() {
        let (exec, _) = executor();
        let task_id = exec
            .submit(&TaskDefinition::from_run("echo hi"), "alice")
            .await
            .unwrap();

        assert!(exec.status(&task_id, "bob").await.unwrap().is_none());
        assert!(exec.status(&task_id, "alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_isolates_owners_and_none_returns_union() {
        let (exec, _) = executor();
        exec.submit(&multi_node_task("a1", 1), "alice").await.unwrap();
        exec.submit(&multi_node_task("a2", 2), "alice").await.unwrap();
        exec.submit(&multi_node_task("b1", 1), "bob@x.io").await.unwrap();

        let alices = exec.list(Some("alice")).await.unwrap();
        assert_eq!(alices.len(), 2);
        assert!(alices.iter().all(|t| t.username.as_deref() == Some("alice")));

        let everyone = exec.list(None).await.unwrap();
        assert_eq!(everyone.len(), 3);
    }

    #[tokio::test]
    async fn stop_respects_ownership() {
        let (exec, _) = executor();
        let task_id = exec
            .submit(&TaskDefinition::from_run("echo hi"), "alice")
            .await
            .unwrap();

        assert!(!exec.stop(&task_id, "bob").await.unwrap());
        assert!(exec.stop(&task_id, "alice").await.unwrap());
        // Second stop finds nothing.
        assert!(!exec.stop(&task_id, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn stop_all_counts_tasks_and_spares_other_owners() {
        let (exec, _) = executor();
        exec.submit(&multi_node_task("a1", 1), "alice").await.unwrap();
        exec.submit(&multi_node_task("a2", 1), "alice").await.unwrap();
        exec.submit(&multi_node_task("b1", 1), "bob").await.unwrap();

        let stopped = exec.stop_all(Some("alice")).await.unwrap();
        assert_eq!(stopped, 2);

        assert!(exec.list(Some("alice")).await.unwrap().is_empty());
        assert_eq!(exec.list(Some("bob")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partial_fan_out_fails_submission_without_rollback() {
        let (exec, store) = executor();
        store.fail_unit_creates_after(1);

        let err = exec.submit(&multi_node_task("t", 3), "alice").await;
        assert!(err.is_err());
        // The unit created before the failure is left behind.
        assert_eq!(store.unit_names().len(), 1);
    }

    #[tokio::test]
    async fn volume_roundtrip_and_claim_resolution() {
        let (exec, _) = executor();
        let volume_id = exec
            .create_volume(
                &VolumeDefinition {
                    name: "data".into(),
                    size: "10Gi".into(),
                    storage_class: None,
                    access_modes: vec!["ReadWriteOnce".into()],
                },
                "alice",
            )
            .await
            .unwrap();

        let status = exec
            .volume_status(&volume_id, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.name.as_deref(), Some("data"));
        assert_eq!(status.claim_name, format!("data-{volume_id}"));

        // Labeled claim resolves to its object name; unknown names are
        // absent so the builder falls back to the literal.
        let mut task = TaskDefinition::from_run("ls");
        task.volumes.insert("/data".into(), "data".into());
        task.volumes.insert("/other".into(), "preexisting-claim".into());
        let resolved = exec.resolve_claims(&task, "alice").await.unwrap();
        assert_eq!(
            resolved.get("data").map(String::as_str),
            Some(status.claim_name.as_str())
        );
        assert!(!resolved.contains_key("preexisting-claim"));

        assert!(exec.delete_volume(&volume_id, "alice").await.unwrap());
        assert!(exec.volume_status(&volume_id, "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn volume_listing_is_owner_scoped() {
        let (exec, _) = executor();
        let def = |name: &str| VolumeDefinition {
            name: name.into(),
            size: "1Gi".into(),
            storage_class: None,
            access_modes: vec!["ReadWriteOnce".into()],
        };
        exec.create_volume(&def("a"), "alice").await.unwrap();
        exec.create_volume(&def("b"), "bob").await.unwrap();

        assert_eq!(exec.list_volumes(Some("alice")).await.unwrap().len(), 1);
        assert_eq!(exec.list_volumes(None).await.unwrap().len(), 2);

        // bob cannot delete alice's volume.
        let alices = exec.list_volumes(Some("alice")).await.unwrap();
        assert!(!exec.delete_volume(&alices[0].volume_id, "bob").await.unwrap());
    }

    #[tokio::test]
    async fn submitted_task_logs_flow_through_feed() {
        let (exec, store) = executor();
        let task_id = exec
            .submit(&TaskDefinition::from_run("echo hi"), "alice")
            .await
            .unwrap();

        let unit = store.unit_names().pop().unwrap();
        store.set_pod_lines(&MemoryStore::pod_name_for(&unit), ["hi"]);

        let feed = exec.tail_logs(&task_id, "alice").await.unwrap();
        assert_eq!(feed.collect().await, vec!["hi"]);

        // Wrong owner discovers no pods: empty feed, not an error.
        let feed = exec.tail_logs(&task_id, "bob").await.unwrap();
        assert!(feed.collect().await.is_empty());
    }
}
