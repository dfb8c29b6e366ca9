use super::Engine;
use crate::view::Mark;
use flowscope_core::{Event, EventKind};
use smallvec::SmallVec;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The single paced consumer. Each cycle suspends for one pacing interval,
/// then pops and applies the oldest event, so a burst of N events is
/// replayed one per interval in exact arrival order. When the pop comes up
/// empty the task retires its own handle under the same lock the producer
/// uses, so an enqueue always either lands in front of a live drain or
/// spawns a fresh one, never in between. The task holds the engine weakly
/// and simply ends if the engine is gone.
pub(super) fn spawn_drain(engine: Weak<Engine>, pacing: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(pacing).await;
            let Some(engine) = engine.upgrade() else {
                break;
            };
            let event = {
                let mut sh = engine.shared();
                match sh.queue.pop_front() {
                    Some(event) => Some(event),
                    None => {
                        sh.drain = None;
                        None
                    }
                }
            };
            match event {
                Some(event) => engine.apply(event),
                None => break,
            }
        }
    })
}

impl Engine {
    /// One event against the mirror. Every kind maps to a fixed side-effect
    /// routine; all of them end in the event log. Events that reference
    /// nodes missing from the current snapshot degrade to log-only: the
    /// overlay write is a no-op and the mark commands are ignored by the
    /// renderer.
    pub(crate) fn apply(&self, event: Event) {
        {
            let mut sh = self.shared();
            let super::Shared {
                model, highlight, ..
            } = &mut *sh;

            match event.kind {
                EventKind::TopicPublish => {
                    if let Some(origin) = &event.from {
                        if let Some(value) = &event.value {
                            model.set_value(origin, value.clone());
                        }
                        let edges = model.outbound_edges(origin);
                        highlight.flash(origin.clone(), Mark::Active, edges);
                    }
                }
                EventKind::AgentPublish => {
                    if let Some(origin) = &event.from {
                        let edges = model.outbound_edges(origin);
                        highlight.flash(origin.clone(), Mark::Active, edges);
                    }
                }
                EventKind::TopicCleared => {
                    if let Some(origin) = &event.from {
                        model.clear_value(origin);
                        highlight.flash(origin.clone(), Mark::Cleared, SmallVec::new());
                    }
                }
                EventKind::ConfigLoaded | EventKind::ConfigUnloaded => {}
            }
        }
        self.log_event(event);
    }
}
