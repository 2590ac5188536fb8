//! Expansion of a task definition into scheduled-unit specifications, and
//! of a volume definition into a storage-claim specification.
//!
//! Building is pure: all cluster lookups (volume-name resolution) happen
//! before, and all create calls after. A validation failure here aborts
//! the submission before anything is created.

use std::collections::BTreeMap;

use skiff_model::{
    ANNOTATION_CREATED_AT, ANNOTATION_NUM_NODES, LABEL_NODE_IDX, LABEL_TASK_ID, LABEL_TASK_NAME,
    LABEL_USERNAME, LABEL_VOLUME_ID, LABEL_VOLUME_NAME, TASK_KIND_LABEL, TaskDefinition, TaskId,
    VOLUME_KIND_LABEL, VolumeDefinition, VolumeId,
};

use crate::error::EngineError;
use crate::identity;
use crate::store::{ClaimSpec, UnitResources, UnitSpec, VolumeAttachment};

/// Image used when the task does not name one.
pub const DEFAULT_IMAGE: &str = "python:3.13-slim";

/// Environment variable carrying the unit's node index.
pub const ENV_NODE_RANK: &str = "NODE_RANK";
/// Environment variable carrying the task's total node count.
pub const ENV_NUM_NODES: &str = "NUM_NODES";

/// Reject malformed definitions before any cluster call.
pub fn validate(task: &TaskDefinition) -> Result<(), EngineError> {
    if task.run.trim().is_empty() {
        return Err(EngineError::Validation("run command is required".into()));
    }
    if task.num_nodes < 1 {
        return Err(EngineError::Validation("num_nodes must be >= 1".into()));
    }
    if let Some(acc) = task.resources.as_ref().and_then(|r| r.accelerators.as_deref()) {
        accelerator_count(acc)?;
    }
    Ok(())
}

/// Parse an accelerator spec of the form `<type>:<count>` or `<count>`.
///
/// The text after the last `:` must be an integer count.
pub fn accelerator_count(spec: &str) -> Result<u32, EngineError> {
    let count = spec.rsplit(':').next().unwrap_or(spec);
    count.trim().parse::<u32>().map_err(|_| {
        EngineError::Validation(format!("malformed accelerator spec: {spec:?}"))
    })
}

/// User-visible task name: the declared name, or `task-<id>`.
pub fn display_name(task: &TaskDefinition, task_id: &TaskId) -> String {
    task.name
        .clone()
        .unwrap_or_else(|| format!("task-{task_id}"))
}

/// Unit object name, unique within a namespace.
fn unit_name(task_name: &str, task_id: &TaskId, num_nodes: u32, node_idx: u32) -> String {
    if num_nodes == 1 {
        format!("{task_name}-{task_id}")
    } else {
        format!("{task_name}-{task_id}-node-{node_idx}")
    }
}

/// Compose the unit's shell script: workdir change first, then setup,
/// then the main command.
fn shell_command(task: &TaskDefinition) -> String {
    let mut parts = Vec::new();
    if let Some(workdir) = &task.workdir {
        parts.push(format!("cd {workdir}"));
    }
    if let Some(setup) = &task.setup {
        parts.push(setup.clone());
    }
    parts.push(task.run.clone());
    parts.join("\n")
}

fn unit_resources(task: &TaskDefinition) -> Result<UnitResources, EngineError> {
    let Some(res) = &task.resources else {
        return Ok(UnitResources::default());
    };
    let accelerator_count = res
        .accelerators
        .as_deref()
        .map(accelerator_count)
        .transpose()?;
    Ok(UnitResources {
        cpu: res.cpus.clone(),
        memory: res.memory.clone(),
        accelerator_count,
    })
}

/// Build one unit specification per node index `0..num_nodes`.
///
/// `resolved_claims` maps volume names to actual claim names for this
/// owner; a volume absent from the map is attached under its literal name,
/// which lets advanced users reference pre-existing claims directly.
///
/// `created_at` is stamped once by the caller so all units of one task
/// share a submission instant.
pub fn build_units(
    task: &TaskDefinition,
    task_id: &TaskId,
    owner: &str,
    resolved_claims: &BTreeMap<String, String>,
    created_at: &str,
) -> Result<Vec<UnitSpec>, EngineError> {
    validate(task)?;

    let task_name = display_name(task, task_id);
    let sanitized = identity::sanitize(owner);
    let resources = unit_resources(task)?;
    let image = task
        .resources
        .as_ref()
        .and_then(|r| r.image_id.clone())
        .unwrap_or_else(|| DEFAULT_IMAGE.to_string());
    let command = shell_command(task);

    let mounts: Vec<VolumeAttachment> = task
        .volumes
        .iter()
        .map(|(mount_path, volume_name)| VolumeAttachment {
            volume_name: volume_name.clone(),
            claim_name: resolved_claims
                .get(volume_name)
                .cloned()
                .unwrap_or_else(|| volume_name.clone()),
            mount_path: mount_path.clone(),
        })
        .collect();

    let units = (0..task.num_nodes)
        .map(|node_idx| {
            let mut labels = BTreeMap::new();
            labels.insert(TASK_KIND_LABEL.to_string(), "true".to_string());
            labels.insert(LABEL_TASK_ID.to_string(), task_id.to_string());
            labels.insert(LABEL_TASK_NAME.to_string(), task_name.clone());
            labels.insert(LABEL_USERNAME.to_string(), sanitized.clone());
            labels.insert(LABEL_NODE_IDX.to_string(), node_idx.to_string());

            let mut annotations = BTreeMap::new();
            annotations.insert(ANNOTATION_CREATED_AT.to_string(), created_at.to_string());
            annotations.insert(ANNOTATION_NUM_NODES.to_string(), task.num_nodes.to_string());

            // User variables first, engine-injected last: on duplicate
            // names the injected NODE_RANK / NUM_NODES win.
            let mut env: Vec<(String, String)> = task
                .envs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            env.push((ENV_NODE_RANK.to_string(), node_idx.to_string()));
            env.push((ENV_NUM_NODES.to_string(), task.num_nodes.to_string()));

            UnitSpec {
                name: unit_name(&task_name, task_id, task.num_nodes, node_idx),
                labels,
                annotations,
                image: image.clone(),
                command: command.clone(),
                env,
                resources: resources.clone(),
                mounts: mounts.clone(),
            }
        })
        .collect();

    Ok(units)
}

/// Claim object name: user-facing volume name plus the generated id.
pub fn claim_name(def: &VolumeDefinition, volume_id: &VolumeId) -> String {
    format!("{}-{volume_id}", def.name)
}

/// Build the storage-claim specification for a volume definition.
pub fn build_claim(
    def: &VolumeDefinition,
    volume_id: &VolumeId,
    owner: &str,
    created_at: &str,
) -> ClaimSpec {
    let mut labels = BTreeMap::new();
    labels.insert(VOLUME_KIND_LABEL.to_string(), "true".to_string());
    labels.insert(LABEL_VOLUME_ID.to_string(), volume_id.to_string());
    labels.insert(LABEL_VOLUME_NAME.to_string(), def.name.clone());
    labels.insert(LABEL_USERNAME.to_string(), identity::sanitize(owner));

    let mut annotations = BTreeMap::new();
    annotations.insert(ANNOTATION_CREATED_AT.to_string(), created_at.to_string());

    ClaimSpec {
        name: claim_name(def, volume_id),
        labels,
        annotations,
        size: def.size.clone(),
        storage_class: def.storage_class.clone(),
        access_modes: def.access_modes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_model::ResourceSpec;

    fn task_id() -> TaskId {
        TaskId::from("abc12345")
    }

    #[test]
    fn fan_out_builds_one_unit_per_node_with_distinct_indices() {
        let mut task = TaskDefinition::from_run("python train.py");
        task.name = Some("train".into());
        task.num_nodes = 3;

        let units =
            build_units(&task, &task_id(), "alice", &BTreeMap::new(), "2026-01-01T00:00:00Z")
                .unwrap();

        assert_eq!(units.len(), 3);
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.labels.get(LABEL_NODE_IDX).unwrap(), &i.to_string());
            assert_eq!(unit.labels.get(LABEL_TASK_ID).unwrap(), "abc12345");
            assert_eq!(unit.name, format!("train-abc12345-node-{i}"));
        }
    }

    #[test]
    fn single_node_unit_name_has_no_node_suffix() {
        let mut task = TaskDefinition::from_run("echo hi");
        task.name = Some("hello".into());

        let units =
            build_units(&task, &task_id(), "alice", &BTreeMap::new(), "t").unwrap();
        assert_eq!(units[0].name, "hello-abc12345");
    }

    #[test]
    fn unnamed_task_gets_generated_name() {
        let task = TaskDefinition::from_run("echo hi");
        let units = build_units(&task, &task_id(), "alice", &BTreeMap::new(), "t").unwrap();
        assert_eq!(units[0].name, "task-abc12345-abc12345");
        assert_eq!(
            units[0].labels.get(LABEL_TASK_NAME).unwrap(),
            "task-abc12345"
        );
    }

    #[test]
    fn command_orders_workdir_setup_run() {
        let mut task = TaskDefinition::from_run("python train.py");
        task.workdir = Some("/app".into());
        task.setup = Some("pip install -r requirements.txt".into());

        let units = build_units(&task, &task_id(), "alice", &BTreeMap::new(), "t").unwrap();
        assert_eq!(
            units[0].command,
            "cd /app\npip install -r requirements.txt\npython train.py"
        );
    }

    #[test]
    fn injected_env_comes_last_and_wins() {
        let mut task = TaskDefinition::from_run("env");
        task.num_nodes = 2;
        task.envs.insert("NODE_RANK".into(), "hijacked".into());
        task.envs.insert("LR".into(), "0.1".into());

        let units = build_units(&task, &task_id(), "alice", &BTreeMap::new(), "t").unwrap();
        let env = &units[1].env;

        // Last occurrence wins downstream, so the injected values must
        // come after any user-supplied duplicates.
        let last_rank = env.iter().rfind(|(k, _)| k == "NODE_RANK").unwrap();
        assert_eq!(last_rank.1, "1");
        assert!(env.iter().any(|(k, v)| k == "LR" && v == "0.1"));
        assert!(env.iter().any(|(k, v)| k == "NUM_NODES" && v == "2"));
    }

    #[test]
    fn resources_copied_verbatim_and_accelerators_parsed() {
        let mut task = TaskDefinition::from_run("train");
        task.resources = Some(ResourceSpec {
            cpus: Some("4".into()),
            memory: Some("8Gi".into()),
            accelerators: Some("V100:2".into()),
            image_id: Some("pytorch/pytorch:latest".into()),
        });

        let units = build_units(&task, &task_id(), "alice", &BTreeMap::new(), "t").unwrap();
        assert_eq!(units[0].resources.cpu.as_deref(), Some("4"));
        assert_eq!(units[0].resources.memory.as_deref(), Some("8Gi"));
        assert_eq!(units[0].resources.accelerator_count, Some(2));
        assert_eq!(units[0].image, "pytorch/pytorch:latest");
    }

    #[test]
    fn accelerator_count_accepts_bare_count() {
        assert_eq!(accelerator_count("1").unwrap(), 1);
        assert_eq!(accelerator_count("V100:4").unwrap(), 4);
        assert!(accelerator_count("V100:many").is_err());
        assert!(accelerator_count("").is_err());
    }

    #[test]
    fn malformed_accelerators_abort_validation() {
        let mut task = TaskDefinition::from_run("train");
        task.resources = Some(ResourceSpec {
            accelerators: Some("A100:lots".into()),
            ..Default::default()
        });
        assert!(matches!(
            build_units(&task, &task_id(), "a", &BTreeMap::new(), "t"),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn empty_run_is_rejected() {
        let task = TaskDefinition::from_run("  ");
        assert!(matches!(validate(&task), Err(EngineError::Validation(_))));
    }

    #[test]
    fn default_image_applies_when_unset() {
        let task = TaskDefinition::from_run("echo hi");
        let units = build_units(&task, &task_id(), "alice", &BTreeMap::new(), "t").unwrap();
        assert_eq!(units[0].image, DEFAULT_IMAGE);
    }

    #[test]
    fn mounts_resolve_through_map_with_literal_fallback() {
        let mut task = TaskDefinition::from_run("ls /data");
        task.volumes.insert("/data".into(), "training-data".into());
        task.volumes.insert("/scratch".into(), "scratch".into());

        let mut resolved = BTreeMap::new();
        resolved.insert("training-data".to_string(), "training-data-vol123".to_string());

        let units = build_units(&task, &task_id(), "alice", &resolved, "t").unwrap();
        let mounts = &units[0].mounts;
        assert_eq!(mounts.len(), 2);

        let data = mounts.iter().find(|m| m.mount_path == "/data").unwrap();
        assert_eq!(data.claim_name, "training-data-vol123");
        let scratch = mounts.iter().find(|m| m.mount_path == "/scratch").unwrap();
        assert_eq!(scratch.claim_name, "scratch");
    }

    #[test]
    fn owner_label_is_sanitized() {
        let task = TaskDefinition::from_run("echo hi");
        let units =
            build_units(&task, &task_id(), "alice@example.com", &BTreeMap::new(), "t").unwrap();
        assert_eq!(
            units[0].labels.get(LABEL_USERNAME).unwrap(),
            "alice-example.com"
        );
    }

    #[test]
    fn claim_spec_carries_identity_labels() {
        let def = VolumeDefinition {
            name: "data".into(),
            size: "10Gi".into(),
            storage_class: Some("fast-ssd".into()),
            access_modes: vec!["ReadWriteMany".into()],
        };
        let id = VolumeId::from("vol12345");
        let claim = build_claim(&def, &id, "bob@x.io", "t");

        assert_eq!(claim.name, "data-vol12345");
        assert_eq!(claim.labels.get(LABEL_VOLUME_ID).unwrap(), "vol12345");
        assert_eq!(claim.labels.get(LABEL_VOLUME_NAME).unwrap(), "data");
        assert_eq!(claim.labels.get(LABEL_USERNAME).unwrap(), "bob-x.io");
        assert_eq!(claim.storage_class.as_deref(), Some("fast-ssd"));
    }
}
