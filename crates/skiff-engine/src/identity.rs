//! Sanitization of user identities into label values, and the selector
//! fragments that scope every query to one owner.
//!
//! Per-tenant isolation exists only by construction: every list, get, stop
//! and delete in the engine builds its selector through this module, so an
//! operation can never observe another owner's objects. There is no other
//! isolation mechanism.

use skiff_model::{LABEL_TASK_ID, LABEL_USERNAME, LABEL_VOLUME_ID, Selector, TaskId, VolumeId};

/// Sanitize a free-form identity into a value legal as a cluster label.
///
/// Replaces `@` with `-`, e.g. `first.last@example.com` becomes
/// `first.last-example.com`. Idempotent. Other DNS-label-illegal
/// characters are left untouched; distinct identities can collide after
/// sanitization. Both are known limitations.
pub fn sanitize(identity: &str) -> String {
    identity.replace('@', "-")
}

/// Selector scoping a kind of object (`skiff-task` / `skiff-volume`) to one
/// owner, or to all owners when `owner` is `None`.
pub fn owned_by(kind_label: &str, owner: Option<&str>) -> Selector {
    let sel = Selector::new().and(kind_label, "true");
    match owner {
        Some(identity) => sel.and(LABEL_USERNAME, sanitize(identity)),
        None => sel,
    }
}

/// Selector matching all units (and their pods) of one task for one owner.
pub fn task_scope(task_id: &TaskId, owner: &str) -> Selector {
    Selector::new()
        .and(LABEL_TASK_ID, task_id.as_str())
        .and(LABEL_USERNAME, sanitize(owner))
}

/// Selector matching one owner's storage claim by volume id.
pub fn volume_scope(volume_id: &VolumeId, owner: &str) -> Selector {
    Selector::new()
        .and(LABEL_VOLUME_ID, volume_id.as_str())
        .and(LABEL_USERNAME, sanitize(owner))
}
