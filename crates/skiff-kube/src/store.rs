use std::time::Duration;

use async_trait::async_trait;
use futures::{AsyncBufReadExt, StreamExt, stream::BoxStream};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::runtime::wait::await_condition;
use kube::{Client, Error as KubeError};
use tracing::debug;

use skiff_engine::StoreError;
use skiff_engine::store::{
    ClaimSnapshot, ClaimSpec, LogStream, PodSnapshot, ResourceStore, UnitSnapshot, UnitSpec,
};
use skiff_model::Selector;

use crate::convert;

/// Cluster-backed resource store.
///
/// Holds a client and a namespace; every object this engine creates or
/// queries lives in that one namespace.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    namespace: String,
}

impl KubeStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Connect using the ambient kubeconfig / in-cluster environment.
    pub async fn try_default(namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::try_default()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self::new(client, namespace))
    }

    fn jobs(&self) -> Api<Job> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn claims(&self) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

fn map_err(err: KubeError) -> StoreError {
    match err {
        KubeError::Api(resp) if resp.code == 409 => StoreError::AlreadyExists(resp.message),
        KubeError::Api(resp) => StoreError::Api(format!("{}: {}", resp.reason, resp.message)),
        other => StoreError::Transport(other.to_string()),
    }
}

fn by_labels(selector: &Selector) -> ListParams {
    ListParams::default().labels(&selector.to_string())
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn create_unit(&self, spec: &UnitSpec) -> Result<(), StoreError> {
        let job = convert::unit_to_job(spec, &self.namespace)?;
        self.jobs()
            .create(&PostParams::default(), &job)
            .await
            .map_err(map_err)?;
        debug!(target: "skiff.store.kube", unit = %spec.name, "unit created");
        Ok(())
    }

    async fn list_units(&self, selector: &Selector) -> Result<Vec<UnitSnapshot>, StoreError> {
        let jobs = self.jobs().list(&by_labels(selector)).await.map_err(map_err)?;
        Ok(jobs.items.iter().map(convert::job_to_snapshot).collect())
    }

    async fn delete_unit(&self, name: &str) -> Result<(), StoreError> {
        self.jobs()
            .delete(name, &DeleteParams::background())
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn create_claim(&self, spec: &ClaimSpec) -> Result<(), StoreError> {
        let pvc = convert::claim_to_pvc(spec, &self.namespace)?;
        self.claims()
            .create(&PostParams::default(), &pvc)
            .await
            .map_err(map_err)?;
        debug!(target: "skiff.store.kube", claim = %spec.name, "claim created");
        Ok(())
    }

    async fn list_claims(&self, selector: &Selector) -> Result<Vec<ClaimSnapshot>, StoreError> {
        let pvcs = self
            .claims()
            .list(&by_labels(selector))
            .await
            .map_err(map_err)?;
        Ok(pvcs.items.iter().map(convert::pvc_to_snapshot).collect())
    }

    async fn delete_claim(&self, name: &str) -> Result<(), StoreError> {
        self.claims()
            .delete(name, &DeleteParams::background())
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn list_pods(&self, selector: &Selector) -> Result<Vec<PodSnapshot>, StoreError> {
        let pods = self.pods().list(&by_labels(selector)).await.map_err(map_err)?;
        Ok(pods.items.iter().map(convert::pod_to_snapshot).collect())
    }

    async fn wait_pod_scheduled(&self, pod: &str, timeout: Duration) -> Result<(), StoreError> {
        let wait = await_condition(self.pods(), pod, |obj: Option<&Pod>| {
            convert::is_pod_scheduled(obj)
        });
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| StoreError::WaitTimeout(format!("pod {pod} scheduled")))?
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn open_logs(&self, pod: &str) -> Result<Box<dyn LogStream>, StoreError> {
        let params = LogParams {
            follow: true,
            ..LogParams::default()
        };
        let reader = self.pods().log_stream(pod, &params).await.map_err(map_err)?;
        Ok(Box::new(KubeLogStream {
            lines: reader.lines().boxed(),
        }))
    }
}

struct KubeLogStream {
    lines: BoxStream<'static, std::io::Result<String>>,
}

#[async_trait]
impl LogStream for KubeLogStream {
    async fn next_line(&mut self) -> Result<Option<String>, StoreError> {
        match self.lines.next().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(err)) => Err(StoreError::Transport(err.to_string())),
            None => Ok(None),
        }
    }
}
