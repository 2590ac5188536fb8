//! Translation between engine spec/snapshot types and cluster objects.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use serde_json::{Value, json};

use skiff_engine::StoreError;
use skiff_engine::store::{ClaimSnapshot, ClaimSpec, PodSnapshot, UnitSnapshot, UnitSpec};

/// Resource key for accelerator-count limits.
const GPU_RESOURCE: &str = "nvidia.com/gpu";

fn invalid_spec(err: impl std::fmt::Display) -> StoreError {
    StoreError::Api(format!("invalid object spec: {err}"))
}

/// Render a unit spec as a batch/v1 Job.
///
/// The pod template carries the same labels as the Job itself so pods stay
/// discoverable by the task selectors. `backoffLimit: 0` plus restart
/// policy `Never` means units never retry internally; a retry is a
/// resubmission at the task level.
pub fn unit_to_job(spec: &UnitSpec, namespace: &str) -> Result<Job, StoreError> {
    let env: Vec<Value> = spec
        .env
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();

    let mut requests = serde_json::Map::new();
    let mut limits = serde_json::Map::new();
    if let Some(cpu) = &spec.resources.cpu {
        requests.insert("cpu".into(), json!(cpu));
        limits.insert("cpu".into(), json!(cpu));
    }
    if let Some(memory) = &spec.resources.memory {
        requests.insert("memory".into(), json!(memory));
        limits.insert("memory".into(), json!(memory));
    }
    if let Some(count) = spec.resources.accelerator_count {
        limits.insert(GPU_RESOURCE.into(), json!(count.to_string()));
    }

    let mut container = json!({
        "name": "task",
        "image": spec.image,
        "command": ["/bin/bash", "-c"],
        "args": [spec.command],
        "env": env,
    });
    if !requests.is_empty() || !limits.is_empty() {
        container["resources"] = json!({ "requests": requests, "limits": limits });
    }

    let mut pod_spec = json!({
        "restartPolicy": "Never",
        "containers": [container],
    });

    if !spec.mounts.is_empty() {
        pod_spec["containers"][0]["volumeMounts"] = spec
            .mounts
            .iter()
            .map(|m| json!({ "name": m.volume_name, "mountPath": m.mount_path }))
            .collect::<Vec<Value>>()
            .into();

        // One pod-level volume per distinct volume name.
        let mut claims: BTreeMap<&str, &str> = BTreeMap::new();
        for m in &spec.mounts {
            claims.insert(&m.volume_name, &m.claim_name);
        }
        pod_spec["volumes"] = claims
            .iter()
            .map(|(volume, claim)| {
                json!({ "name": volume, "persistentVolumeClaim": { "claimName": claim } })
            })
            .collect::<Vec<Value>>()
            .into();
    }

    let job = json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
            "labels": spec.labels,
            "annotations": spec.annotations,
        },
        "spec": {
            "backoffLimit": 0,
            "template": {
                "metadata": { "labels": spec.labels },
                "spec": pod_spec,
            },
        },
    });

    serde_json::from_value(job).map_err(invalid_spec)
}

/// Render a claim spec as a PersistentVolumeClaim.
pub fn claim_to_pvc(spec: &ClaimSpec, namespace: &str) -> Result<PersistentVolumeClaim, StoreError> {
    let mut pvc_spec = json!({
        "accessModes": spec.access_modes,
        "resources": { "requests": { "storage": spec.size } },
    });
    if let Some(class) = &spec.storage_class {
        pvc_spec["storageClassName"] = json!(class);
    }

    let pvc = json!({
        "apiVersion": "v1",
        "kind": "PersistentVolumeClaim",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
            "labels": spec.labels,
            "annotations": spec.annotations,
        },
        "spec": pvc_spec,
    });

    serde_json::from_value(pvc).map_err(invalid_spec)
}

fn counter(value: Option<i32>) -> u32 {
    value.unwrap_or(0).max(0) as u32
}

pub fn job_to_snapshot(job: &Job) -> UnitSnapshot {
    let status = job.status.as_ref();
    UnitSnapshot {
        name: job.metadata.name.clone().unwrap_or_default(),
        namespace: job.metadata.namespace.clone().unwrap_or_default(),
        labels: job.metadata.labels.clone().unwrap_or_default(),
        annotations: job.metadata.annotations.clone().unwrap_or_default(),
        succeeded: counter(status.and_then(|s| s.succeeded)),
        failed: counter(status.and_then(|s| s.failed)),
        active: counter(status.and_then(|s| s.active)),
    }
}

pub fn pvc_to_snapshot(pvc: &PersistentVolumeClaim) -> ClaimSnapshot {
    let spec = pvc.spec.as_ref();
    let size = spec
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|req| req.get("storage"))
        .map(|q| q.0.clone())
        .unwrap_or_default();

    ClaimSnapshot {
        name: pvc.metadata.name.clone().unwrap_or_default(),
        namespace: pvc.metadata.namespace.clone().unwrap_or_default(),
        labels: pvc.metadata.labels.clone().unwrap_or_default(),
        annotations: pvc.metadata.annotations.clone().unwrap_or_default(),
        size,
        storage_class: spec.and_then(|s| s.storage_class_name.clone()),
        access_modes: spec.and_then(|s| s.access_modes.clone()).unwrap_or_default(),
        phase: pvc
            .status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
    }
}

pub fn pod_to_snapshot(pod: &Pod) -> PodSnapshot {
    PodSnapshot {
        name: pod.metadata.name.clone().unwrap_or_default(),
        labels: pod.metadata.labels.clone().unwrap_or_default(),
    }
}

/// True once the pod has been assigned a node, whether or not it has
/// started (or already finished) running. Matches the `PodScheduled`
/// condition, which also holds for terminated pods whose logs are still
/// retrievable.
pub fn is_pod_scheduled(pod: Option<&Pod>) -> bool {
    pod.and_then(|p| p.status.as_ref())
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == "PodScheduled" && c.status == "True")
        })
}
