use std::collections::BTreeMap;
use std::fmt;

/// Marker label carried by every scheduled unit (and its pods).
pub const TASK_KIND_LABEL: &str = "skiff-task";
/// Marker label carried by every storage claim.
pub const VOLUME_KIND_LABEL: &str = "skiff-volume";

pub const LABEL_TASK_ID: &str = "task-id";
pub const LABEL_TASK_NAME: &str = "task-name";
pub const LABEL_USERNAME: &str = "username";
pub const LABEL_NODE_IDX: &str = "node-idx";
pub const LABEL_VOLUME_ID: &str = "volume-id";
pub const LABEL_VOLUME_NAME: &str = "volume-name";

pub const ANNOTATION_CREATED_AT: &str = "created-at";
pub const ANNOTATION_NUM_NODES: &str = "num-nodes";

/// Conjunction of exact-match `key=value` terms.
///
/// The cluster's label index is the only query mechanism this system uses:
/// there is no separate metadata store, so every lookup (list, status, stop,
/// log discovery) is a `Selector` evaluated against object labels. Renders
/// to the standard comma-joined label-selector syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector(Vec<(String, String)>);

impl Selector {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add an exact-match term.
    pub fn and<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Evaluate the conjunction against a label set.
    ///
    /// Used by store backends without server-side selector support; the
    /// kube backend pushes the rendered form down to the API server instead.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|have| have == v))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}
