//! Reduction of per-unit cluster state into one task status, and of a
//! claim's state into a volume status.
//!
//! Statuses are derived, never stored: every query re-aggregates the
//! current snapshot, so there is no second source of truth to keep
//! consistent.

use skiff_model::{
    ANNOTATION_CREATED_AT, ANNOTATION_NUM_NODES, LABEL_TASK_ID, LABEL_TASK_NAME, LABEL_USERNAME,
    LABEL_VOLUME_ID, LABEL_VOLUME_NAME, TaskId, TaskNodes, TaskState, TaskStatus, VolumeId,
    VolumeStatus,
};

use crate::store::{ClaimSnapshot, UnitSnapshot};
use crate::util::now_rfc3339;

/// Phase of one scheduled unit, derived from its cluster counters.
/// Mutually exclusive; evaluated in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPhase {
    Succeeded,
    Failed,
    Running,
    Pending,
}

pub fn unit_phase(unit: &UnitSnapshot) -> UnitPhase {
    if unit.succeeded > 0 {
        UnitPhase::Succeeded
    } else if unit.failed > 0 {
        UnitPhase::Failed
    } else if unit.active > 0 {
        UnitPhase::Running
    } else {
        UnitPhase::Pending
    }
}

/// Reduce the units of one task (non-empty) into a single status.
///
/// Precedence, first match wins:
/// 1. `completed`: every unit succeeded;
/// 2. `failed`: at least one unit failed;
/// 3. `running`: at least one unit running;
/// 4. `pending`: otherwise.
///
/// A multi-node task is only done when all nodes finish but fails as soon
/// as any node fails; a single failed node generally poisons the whole
/// distributed job.
///
/// Returns `None` for an empty slice; callers surface that as not-found.
pub fn aggregate(units: &[UnitSnapshot]) -> Option<TaskStatus> {
    let first = units.first()?;

    let mut succeeded = 0u32;
    let mut failed = 0u32;
    let mut running = 0u32;
    let mut pending = 0u32;
    for unit in units {
        match unit_phase(unit) {
            UnitPhase::Succeeded => succeeded += 1,
            UnitPhase::Failed => failed += 1,
            UnitPhase::Running => running += 1,
            UnitPhase::Pending => pending += 1,
        }
    }

    let state = if succeeded as usize == units.len() {
        TaskState::Completed
    } else if failed > 0 {
        TaskState::Failed
    } else if running > 0 {
        TaskState::Running
    } else {
        TaskState::Pending
    };

    let num_nodes = first
        .annotation(ANNOTATION_NUM_NODES)
        .and_then(|n| n.parse().ok())
        .unwrap_or(units.len() as u32);

    Some(TaskStatus {
        task_id: TaskId::from(first.label(LABEL_TASK_ID).unwrap_or("unknown")),
        name: first.label(LABEL_TASK_NAME).map(str::to_string),
        state,
        // All units of one task share a submission instant; the first
        // unit's annotation stands for the task.
        created_at: first
            .annotation(ANNOTATION_CREATED_AT)
            .unwrap_or_default()
            .to_string(),
        updated_at: now_rfc3339(),
        username: first.label(LABEL_USERNAME).map(str::to_string),
        nodes: TaskNodes {
            num_nodes,
            unit_names: units.iter().map(|u| u.name.clone()).collect(),
            succeeded,
            failed,
            running,
            pending,
        },
    })
}

/// Volume status is a 1:1 passthrough of the claim's reported state.
pub fn claim_status(claim: &ClaimSnapshot) -> VolumeStatus {
    VolumeStatus {
        volume_id: VolumeId::from(claim.label(LABEL_VOLUME_ID).unwrap_or("unknown")),
        name: claim.label(LABEL_VOLUME_NAME).map(str::to_string),
        size: claim.size.clone(),
        storage_class: claim.storage_class.clone(),
        access_modes: claim.access_modes.clone(),
        phase: claim.phase.clone(),
        created_at: claim
            .annotations
            .get(ANNOTATION_CREATED_AT)
            .cloned()
            .unwrap_or_default(),
        username: claim.label(LABEL_USERNAME).map(str::to_string),
        claim_name: claim.name.clone(),
        namespace: claim.namespace.clone(),
    }
}
