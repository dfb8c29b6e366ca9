use crate::engine::layout::LayoutPlan;
use crate::engine::ConnectionStatus;
use flowscope_core::{Edge, Event, NodeId, NodeKind};

/// Transient visual emphasis classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Active,
    Cleared,
}

impl Mark {
    pub fn class(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cleared => "cleared",
        }
    }
}

/// A renderable node: TOPIC labels are two lines (name over current value),
/// AGENT labels a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeElement {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
}

/// Everything the engine asks of the rendering collaborator. The renderer is
/// out of scope here; removing a mark that is not set, or touching a node
/// that no longer exists, must be a no-op on its side.
#[derive(Debug, Clone)]
pub enum ViewCommand {
    ReplaceGraph {
        nodes: Vec<NodeElement>,
        edges: Vec<Edge>,
    },
    EmptyGraph,
    Layout(LayoutPlan),
    SetNodeValue {
        id: NodeId,
        value: Option<String>,
    },
    AddMark {
        id: NodeId,
        mark: Mark,
        edges: Vec<Edge>,
    },
    RemoveMark {
        id: NodeId,
        mark: Mark,
        edges: Vec<Edge>,
    },
    Status(ConnectionStatus),
    LogEvent(Event),
    History(Vec<Event>),
    Topics(Vec<String>),
    Banner(String),
}

/// Non-blocking handle onto the render side. Sends are fire-and-forget; a
/// renderer that has gone away must never stall the engine.
#[derive(Clone)]
pub struct ViewSink {
    tx: crossbeam_channel::Sender<ViewCommand>,
}

impl ViewSink {
    pub fn new() -> (Self, crossbeam_channel::Receiver<ViewCommand>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    pub fn send(&self, cmd: ViewCommand) {
        let _ = self.tx.send(cmd);
    }
}
