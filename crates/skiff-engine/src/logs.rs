//! Log fan-in: merge the live output of every pod of a task into one
//! line-based feed.
//!
//! One worker per pod, all started up front, so total wait time is bounded
//! by the slowest pod rather than the sum. Workers push onto a shared
//! unbounded channel and each pushes exactly one terminal sentinel, which
//! lets the consumer count down active workers and detect exhaustion
//! without any extra coordination primitive. Lines from one pod stay in
//! order; interleaving across pods is unspecified.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use skiff_model::LABEL_NODE_IDX;

use crate::error::StoreError;
use crate::store::{PodSnapshot, ResourceStore};

/// Ceiling on waiting for a pod to be scheduled. A pod that never
/// schedules has no logs to show; its stream closes without output.
pub const SCHEDULE_WAIT_CEILING: Duration = Duration::from_secs(300);

enum LogEvent {
    Line(String),
    /// Terminal sentinel, sent exactly once per worker.
    Closed,
}

/// Merged, finite feed of log lines from all pods of one task.
///
/// Finite: ends when the last pod's stream ends. Not restartable: a new
/// tail re-discovers pods and re-opens streams. Dropping the feed stops
/// consumption; workers notice the closed channel on their next send and
/// wind down on their own.
pub struct LogFeed {
    rx: mpsc::UnboundedReceiver<LogEvent>,
    active: usize,
}

impl LogFeed {
    /// Next merged line, or `None` once every worker has closed.
    pub async fn recv(&mut self) -> Option<String> {
        while self.active > 0 {
            match self.rx.recv().await? {
                LogEvent::Line(line) => return Some(line),
                LogEvent::Closed => self.active -= 1,
            }
        }
        None
    }

    /// Drain the remainder of the feed into a vector.
    pub async fn collect(mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.recv().await {
            lines.push(line);
        }
        lines
    }
}

/// Start one worker per pod and return the merged feed.
///
/// Zero pods yields a feed that is exhausted immediately; that is an
/// ordinary outcome, not an error.
pub fn fan_in<S: ResourceStore>(store: Arc<S>, pods: Vec<PodSnapshot>) -> LogFeed {
    let (tx, rx) = mpsc::unbounded_channel();
    let active = pods.len();
    let multi_node = pods.len() > 1;

    for pod in pods {
        let tx = tx.clone();
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            if let Err(err) = stream_pod(&*store, &pod, multi_node, &tx).await {
                // A pod that fails to schedule or stream contributes
                // nothing; the other workers are unaffected.
                debug!(target: "skiff.engine.logs", pod = %pod.name, %err, "log stream closed");
            }
            let _ = tx.send(LogEvent::Closed);
        });
    }

    LogFeed { rx, active }
}

async fn stream_pod<S: ResourceStore>(
    store: &S,
    pod: &PodSnapshot,
    multi_node: bool,
    tx: &mpsc::UnboundedSender<LogEvent>,
) -> Result<(), StoreError> {
    store
        .wait_pod_scheduled(&pod.name, SCHEDULE_WAIT_CEILING)
        .await?;

    let node_idx = pod.label(LABEL_NODE_IDX).unwrap_or("0").to_string();
    let mut stream = store.open_logs(&pod.name).await?;

    while let Some(line) = stream.next_line().await? {
        let line = if multi_node {
            format!("node-{node_idx} | {line}")
        } else {
            line
        };
        if tx.send(LogEvent::Line(line)).is_err() {
            // Consumer dropped the feed; stop reading.
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::{ResourceStore, UnitSpec};
    use skiff_model::{LABEL_NODE_IDX, LABEL_TASK_ID, Selector};
    use std::collections::BTreeMap;

    async fn pod_with_lines(store: &MemoryStore, unit: &str, node_idx: u32, lines: &[&str]) {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_TASK_ID.to_string(), "t1".to_string());
        labels.insert(LABEL_NODE_IDX.to_string(), node_idx.to_string());
        store
            .create_unit(&UnitSpec {
                name: unit.to_string(),
                labels,
                annotations: BTreeMap::new(),
                image: "busybox".into(),
                command: "true".into(),
                env: Vec::new(),
                resources: Default::default(),
                mounts: Vec::new(),
            })
            .await
            .unwrap();
        store.set_pod_lines(&MemoryStore::pod_name_for(unit), lines.to_vec());
    }

    async fn task_pods(store: &MemoryStore) -> Vec<PodSnapshot> {
        store
            .list_pods(&Selector::new().and(LABEL_TASK_ID, "t1"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn zero_pods_yield_empty_feed() {
        let store = Arc::new(MemoryStore::new());
        let mut feed = fan_in(store, Vec::new());
        assert_eq!(feed.recv().await, None);
    }

    #[tokio::test]
    async fn single_pod_lines_pass_through_unprefixed() {
        let store = Arc::new(MemoryStore::new());
        pod_with_lines(&store, "u0", 0, &["one", "two"]).await;

        let pods = task_pods(&store).await;
        let lines = fan_in(Arc::clone(&store), pods).collect().await;
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn three_pods_merge_union_with_per_pod_order() {
        let store = Arc::new(MemoryStore::new());
        pod_with_lines(&store, "u0", 0, &["a0", "a1"]).await;
        pod_with_lines(&store, "u1", 1, &["b0", "b1"]).await;
        pod_with_lines(&store, "u2", 2, &["c0", "c1"]).await;

        let pods = task_pods(&store).await;
        let lines = fan_in(Arc::clone(&store), pods).collect().await;

        // Union of all lines, each prefixed with its node index.
        assert_eq!(lines.len(), 6);
        for node in 0..3 {
            let from_node: Vec<&String> = lines
                .iter()
                .filter(|l| l.starts_with(&format!("node-{node} | ")))
                .collect();
            assert_eq!(from_node.len(), 2, "node {node}");
            // Per-pod ordering is preserved through the merge.
            assert!(from_node[0].ends_with('0'));
            assert!(from_node[1].ends_with('1'));
        }
    }

    #[tokio::test]
    async fn unschedulable_pod_closes_silently_without_blocking_others() {
        let store = Arc::new(MemoryStore::new());
        pod_with_lines(&store, "u0", 0, &["good"]).await;
        pod_with_lines(&store, "u1", 1, &["never seen"]).await;
        store.set_pod_unschedulable(&MemoryStore::pod_name_for("u1"));

        let pods = task_pods(&store).await;
        let lines = fan_in(Arc::clone(&store), pods).collect().await;
        assert_eq!(lines, vec!["node-0 | good"]);
    }

    #[tokio::test]
    async fn dropping_the_feed_does_not_wedge_producers() {
        let store = Arc::new(MemoryStore::new());
        pod_with_lines(&store, "u0", 0, &["x"; 100]).await;

        let pods = task_pods(&store).await;
        let mut feed = fan_in(Arc::clone(&store), pods);
        let _ = feed.recv().await;
        drop(feed);
        // Workers detect the closed channel on their next send; nothing to
        // assert beyond the test completing.
        tokio::task::yield_now().await;
    }
}
