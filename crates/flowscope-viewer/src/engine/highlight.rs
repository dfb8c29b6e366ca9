use crate::view::{Mark, ViewCommand, ViewSink};
use flowscope_core::{Edge, NodeId};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Time-boxed visual emphasis. Every flash is independent: it adds the mark
/// immediately and spawns its own revert timer; the revert removes the mark
/// unconditionally, so overlapping flashes on one node never interfere
/// (removing an absent mark is a renderer no-op). Timers are abortable and
/// keyed by node so a reconciliation can cancel everything pending.
pub struct HighlightController {
    active: Duration,
    cleared: Duration,
    view: ViewSink,
    timers: HashMap<NodeId, Vec<AbortHandle>>,
}

impl HighlightController {
    pub fn new(active: Duration, cleared: Duration, view: ViewSink) -> Self {
        Self {
            active,
            cleared,
            view,
            timers: HashMap::new(),
        }
    }

    pub fn flash(&mut self, id: NodeId, mark: Mark, edges: SmallVec<[Edge; 4]>) {
        let edges: Vec<Edge> = edges.into_vec();
        self.view.send(ViewCommand::AddMark {
            id: id.clone(),
            mark,
            edges: edges.clone(),
        });

        let duration = match mark {
            Mark::Active => self.active,
            Mark::Cleared => self.cleared,
        };
        let view = self.view.clone();
        let revert_id = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            view.send(ViewCommand::RemoveMark {
                id: revert_id,
                mark,
                edges,
            });
        });

        let pending = self.timers.entry(id).or_default();
        pending.retain(|h| !h.is_finished());
        pending.push(handle.abort_handle());
    }

    /// Cancels every pending revert. Used when a snapshot replaces the node
    /// set; the fresh elements carry no marks, so nothing is left dangling.
    pub fn cancel_all(&mut self) {
        for (_, pending) in self.timers.drain() {
            for handle in pending {
                handle.abort();
            }
        }
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.timers
            .values()
            .map(|v| v.iter().filter(|h| !h.is_finished()).count())
            .sum()
    }
}
