pub mod layout;

mod dispatch;
mod highlight;
mod model;
mod queue;
mod reconcile;

pub use reconcile::node_label;

use crate::net::client::ApiClient;
use crate::net::feed;
use crate::net::protocol::Incoming;
use crate::view::{ViewCommand, ViewSink};
use flowscope_core::{now_millis, Event, EventKind};
use highlight::HighlightController;
use model::GraphModel;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between drained events.
    pub pacing: Duration,
    pub active_mark: Duration,
    pub cleared_mark: Duration,
    pub log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(1000),
            active_mark: Duration::from_millis(600),
            cleared_mark: Duration::from_millis(400),
            log_capacity: 30,
        }
    }
}

pub(crate) struct Shared {
    pub model: GraphModel,
    pub queue: VecDeque<Event>,
    pub log: VecDeque<Event>,
    pub status: ConnectionStatus,
    pub drain: Option<JoinHandle<()>>,
    pub feed: Option<JoinHandle<()>>,
    pub highlight: HighlightController,
}

/// The observer engine. Owns the graph mirror, event queue, drain task,
/// feed task and connection status, so independent instances and clean
/// teardown work. Background tasks hold only a weak handle and die with
/// the engine.
///
/// The mutex is only ever held across synchronous sections; suspension
/// happens at network awaits and timer sleeps, never while locked.
pub struct Engine {
    me: Weak<Engine>,
    pub(crate) cfg: EngineConfig,
    pub(crate) client: ApiClient,
    pub(crate) view: ViewSink,
    state: Mutex<Shared>,
}

impl Engine {
    pub fn new(cfg: EngineConfig, client: ApiClient, view: ViewSink) -> Arc<Self> {
        Arc::new_cyclic(|me| {
            let shared = Shared {
                model: GraphModel::new(view.clone()),
                queue: VecDeque::new(),
                log: VecDeque::new(),
                status: ConnectionStatus::Disconnected,
                drain: None,
                feed: None,
                highlight: HighlightController::new(
                    cfg.active_mark,
                    cfg.cleared_mark,
                    view.clone(),
                ),
            };
            Self {
                me: me.clone(),
                cfg,
                client,
                view,
                state: Mutex::new(shared),
            }
        })
    }

    pub(crate) fn shared(&self) -> MutexGuard<'_, Shared> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared().status
    }

    pub fn queue_len(&self) -> usize {
        self.shared().queue.len()
    }

    pub fn event_log(&self) -> Vec<Event> {
        self.shared().log.iter().cloned().collect()
    }

    // ----- Connection state machine -----

    /// Opens the live feed. No-op while a feed task is live, whether it is
    /// still connecting or already CONNECTED; redundant calls collapse into
    /// the one active subscription.
    pub fn connect(&self) {
        let mut sh = self.shared();
        if sh.feed.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        sh.feed = Some(feed::spawn(
            self.me.clone(),
            self.client.addr().to_string(),
        ));
    }

    /// Closes the active subscription, if any. Safe no-op when already
    /// disconnected. Does not touch the queue: anything already received
    /// keeps draining.
    pub fn disconnect(&self) {
        let mut sh = self.shared();
        if let Some(handle) = sh.feed.take() {
            handle.abort();
        }
        if sh.status != ConnectionStatus::Disconnected {
            sh.status = ConnectionStatus::Disconnected;
            self.view
                .send(ViewCommand::Status(ConnectionStatus::Disconnected));
        }
    }

    /// Feed-task callback: status changes and parsed events.
    pub(crate) fn handle_incoming(&self, inc: Incoming) {
        match inc {
            Incoming::Connected { server } => {
                tracing::info!(server = %server, "live feed connected");
                let mut sh = self.shared();
                sh.status = ConnectionStatus::Connected;
                self.view
                    .send(ViewCommand::Status(ConnectionStatus::Connected));
            }
            Incoming::Event(event) => self.enqueue(event),
            Incoming::Disconnected { reason } => {
                if let Some(reason) = &reason {
                    tracing::warn!(%reason, "live feed lost; reconnect to resume");
                }
                let mut sh = self.shared();
                if sh.status != ConnectionStatus::Disconnected {
                    sh.status = ConnectionStatus::Disconnected;
                    self.view
                        .send(ViewCommand::Status(ConnectionStatus::Disconnected));
                }
            }
        }
    }

    // ----- Queue intake -----

    pub(crate) fn enqueue(&self, event: Event) {
        let mut sh = self.shared();
        sh.queue.push_back(event);
        if sh.drain.is_none() {
            sh.drain = Some(queue::spawn_drain(self.me.clone(), self.cfg.pacing));
        }
    }

    /// Drops everything still queued and cancels the in-flight drain, so no
    /// stale event can land on a model that is about to be reset.
    pub(crate) fn purge_queue(&self) {
        let mut sh = self.shared();
        sh.queue.clear();
        if let Some(handle) = sh.drain.take() {
            handle.abort();
        }
    }

    // ----- Event log -----

    pub(crate) fn log_event(&self, event: Event) {
        {
            let mut sh = self.shared();
            sh.log.push_back(event.clone());
            while sh.log.len() > self.cfg.log_capacity {
                sh.log.pop_front();
            }
        }
        self.view.send(ViewCommand::LogEvent(event));
    }

    pub(crate) fn log_synthetic(&self, kind: EventKind) {
        self.log_event(Event::new(now_millis(), kind, None, None));
    }

    pub(crate) fn banner(&self, msg: impl Into<String>) {
        self.view.send(ViewCommand::Banner(msg.into()));
    }

    /// Clean teardown: feed closed, queue purged, pending reverts cancelled.
    pub fn shutdown(&self) {
        self.disconnect();
        self.purge_queue();
        self.shared().highlight.cancel_all();
    }
}
