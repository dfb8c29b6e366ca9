use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Epoch milliseconds, the `ts` unit used on the wire.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeKind {
    Topic,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

/// Closed set of live-feed event tags. Unknown tags fail deserialization
/// and the frame is dropped by the reader.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ConfigLoaded,
    ConfigUnloaded,
    TopicPublish,
    AgentPublish,
    TopicCleared,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigLoaded => "CONFIG_LOADED",
            Self::ConfigUnloaded => "CONFIG_UNLOADED",
            Self::TopicPublish => "TOPIC_PUBLISH",
            Self::AgentPublish => "AGENT_PUBLISH",
            Self::TopicCleared => "TOPIC_CLEARED",
        }
    }
}

/// One live-feed frame: `{ts, type, from, value}`. Ordering of events is
/// defined by arrival, never by `ts`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub ts: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub from: Option<NodeId>,
    pub value: Option<String>,
}

impl Event {
    pub fn new(ts: u64, kind: EventKind, from: Option<NodeId>, value: Option<String>) -> Self {
        Self {
            ts,
            kind,
            from,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Double,
    Text,
}

/// Publish body: `{type: "double" | "text", value}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueSpec {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub value: String,
}

impl ValueSpec {
    pub fn double(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Double,
            value: value.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Text,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Request {
    ConfigLoad { config_text: String },
    ConfigUnload,
    TopicsList,
    GraphSnapshot,
    TopicPublish { topic: String, body: ValueSpec },
    TopicClear { topic: String },
    EventsRecent { limit: usize },
    Subscribe,
}

/// One response frame per request connection. A `Subscribe` connection is
/// answered with `Subscribed` and then switches to raw `Event` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Response {
    Ack {
        ok: bool,
        error: Option<String>,
    },
    Topics {
        topics: Vec<String>,
    },
    Snapshot {
        nodes: Vec<NodeInfo>,
        edges: Vec<Edge>,
    },
    Subscribed {
        server: String,
    },
    Events {
        events: Vec<Event>,
    },
}

impl Response {
    pub fn ok() -> Self {
        Self::Ack {
            ok: true,
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self::Ack {
            ok: false,
            error: Some(error.into()),
        }
    }
}
