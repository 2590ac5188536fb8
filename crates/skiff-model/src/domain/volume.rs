use serde::{Deserialize, Serialize};

use crate::VolumeId;

fn default_access_modes() -> Vec<String> {
    vec!["ReadWriteOnce".to_string()]
}

/// A user's request for persistent storage.
///
/// The claim object created in the cluster gets a name derived from
/// `name` plus a generated volume id, so the user-facing name stays
/// reusable while object names remain unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDefinition {
    pub name: String,
    /// Requested capacity in cluster quantity syntax, e.g. `"10Gi"`.
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(default = "default_access_modes")]
    pub access_modes: Vec<String>,
}

/// Point-in-time view of a storage claim, read back from the cluster on
/// every query. The `phase` string is the cluster-reported phase verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStatus {
    pub volume_id: VolumeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    pub access_modes: Vec<String>,
    pub phase: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Name of the underlying claim object.
    pub claim_name: String,
    pub namespace: String,
}
