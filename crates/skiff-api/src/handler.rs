use async_trait::async_trait;

use skiff_engine::logs::LogFeed;
use skiff_engine::store::ResourceStore;
use skiff_engine::{EngineError, TaskExecutor};
use skiff_model::{TaskDefinition, TaskId, TaskStatus, VolumeDefinition, VolumeId, VolumeStatus};

/// Engine operations the HTTP layer exposes.
///
/// Abstracting the executor behind a trait lets tests mount the router
/// over the in-memory store and leaves room for wrappers (rate limiting,
/// auditing) without touching the routes.
#[async_trait]
pub trait Orchestrator: Send + Sync + 'static {
    async fn submit(&self, task: TaskDefinition, owner: &str) -> Result<TaskId, EngineError>;
    async fn stop(&self, task_id: &TaskId, owner: &str) -> Result<bool, EngineError>;
    async fn stop_all(&self, owner: Option<&str>) -> Result<usize, EngineError>;
    async fn list(&self, owner: Option<&str>) -> Result<Vec<TaskStatus>, EngineError>;
    async fn status(&self, task_id: &TaskId, owner: &str)
    -> Result<Option<TaskStatus>, EngineError>;
    async fn tail_logs(&self, task_id: &TaskId, owner: &str) -> Result<LogFeed, EngineError>;

    async fn create_volume(
        &self,
        def: VolumeDefinition,
        owner: &str,
    ) -> Result<VolumeId, EngineError>;
    async fn delete_volume(&self, volume_id: &VolumeId, owner: &str)
    -> Result<bool, EngineError>;
    async fn list_volumes(&self, owner: Option<&str>) -> Result<Vec<VolumeStatus>, EngineError>;
    async fn volume_status(
        &self,
        volume_id: &VolumeId,
        owner: &str,
    ) -> Result<Option<VolumeStatus>, EngineError>;
}

#[async_trait]
impl<S: ResourceStore> Orchestrator for TaskExecutor<S> {
    async fn submit(&self, task: TaskDefinition, owner: &str) -> Result<TaskId, EngineError> {
        TaskExecutor::submit(self, &task, owner).await
    }

    async fn stop(&self, task_id: &TaskId, owner: &str) -> Result<bool, EngineError> {
        TaskExecutor::stop(self, task_id, owner).await
    }

    async fn stop_all(&self, owner: Option<&str>) -> Result<usize, EngineError> {
        TaskExecutor::stop_all(self, owner).await
    }

    async fn list(&self, owner: Option<&str>) -> Result<Vec<TaskStatus>, EngineError> {
        TaskExecutor::list(self, owner).await
    }

    async fn status(
        &self,
        task_id: &TaskId,
        owner: &str,
    ) -> Result<Option<TaskStatus>, EngineError> {
        TaskExecutor::status(self, task_id, owner).await
    }

    async fn tail_logs(&self, task_id: &TaskId, owner: &str) -> Result<LogFeed, EngineError> {
        TaskExecutor::tail_logs(self, task_id, owner).await
    }

    async fn create_volume(
        &self,
        def: VolumeDefinition,
        owner: &str,
    ) -> Result<VolumeId, EngineError> {
        TaskExecutor::create_volume(self, &def, owner).await
    }

    async fn delete_volume(
        &self,
        volume_id: &VolumeId,
        owner: &str,
    ) -> Result<bool, EngineError> {
        TaskExecutor::delete_volume(self, volume_id, owner).await
    }

    async fn list_volumes(&self, owner: Option<&str>) -> Result<Vec<VolumeStatus>, EngineError> {
        TaskExecutor::list_volumes(self, owner).await
    }

    async fn volume_status(
        &self,
        volume_id: &VolumeId,
        owner: &str,
    ) -> Result<Option<VolumeStatus>, EngineError> {
        TaskExecutor::volume_status(self, volume_id, owner).await
    }
}
