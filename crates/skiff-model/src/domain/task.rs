use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Resource requirements for a task.
///
/// All quantities are passed through as strings in the cluster's own
/// quantity syntax (`"500m"`, `"2Gi"`, ...); the engine does not model
/// overcommit. `accelerators` accepts `"<type>:<count>"` or a bare count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerators: Option<String>,
    /// Container image; the engine falls back to a default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

/// A user's declarative description of a batch workload.
///
/// Immutable once submitted: the engine expands it into `num_nodes`
/// scheduled units and never consults the definition again (all later
/// queries go through labels on the created objects).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Directory to `cd` into before setup and run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    /// Number of scheduled units to fan out; each gets a distinct node index.
    #[serde(default = "default_num_nodes")]
    pub num_nodes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
    /// User environment variables, injected into every unit.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub envs: BTreeMap<String, String>,
    /// Mount path -> volume name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, String>,
    /// Commands run once before `run`, in the same shell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    /// Main command. The only required field.
    pub run: String,
}

fn default_num_nodes() -> u32 {
    1
}

impl TaskDefinition {
    /// Minimal definition: a run command on a single node.
    pub fn from_run<S: Into<String>>(run: S) -> Self {
        Self {
            name: None,
            workdir: None,
            num_nodes: 1,
            resources: None,
            envs: BTreeMap::new(),
            volumes: BTreeMap::new(),
            setup: None,
            run: run.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_nodes_defaults_to_one() {
        let task: TaskDefinition = serde_yaml::from_str("run: echo hi").unwrap();
        assert_eq!(task.num_nodes, 1);
        assert_eq!(task.run, "echo hi");
        assert!(task.envs.is_empty());
    }

    #[test]
    fn full_definition_parses() {
        let yaml = r#"
name: train
workdir: /app
num_nodes: 2
resources:
  cpus: "4"
  memory: 8Gi
  accelerators: V100:1
  image_id: pytorch/pytorch:latest
envs:
  LR: "0.1"
volumes:
  /data: training-data
setup: pip install -r requirements.txt
run: python train.py
"#;
        let task: TaskDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(task.name.as_deref(), Some("train"));
        assert_eq!(task.num_nodes, 2);
        let res = task.resources.unwrap();
        assert_eq!(res.accelerators.as_deref(), Some("V100:1"));
        assert_eq!(task.volumes.get("/data").map(String::as_str), Some("training-data"));
    }

    #[test]
    fn missing_run_is_rejected() {
        let parsed: Result<TaskDefinition, _> = serde_yaml::from_str("name: no-run");
        assert!(parsed.is_err());
    }
}
