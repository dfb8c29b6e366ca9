use crate::agents::{FlowAgent, Outbox};
use flowscope_core::{now_millis, Event, EventKind, NodeId};
use std::collections::{BTreeMap, VecDeque};

/// Cyclic wirings would cascade forever; the pump stops after this many
/// deliveries in one external publish.
const MAX_CASCADE: usize = 1024;

/// A published value, carried as text alongside its numeric parse (NaN when
/// the text is not a number).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    text: String,
    num: f64,
}

impl Message {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let num = text.trim().parse::<f64>().unwrap_or(f64::NAN);
        Self { text, num }
    }

    pub fn from_double(num: f64) -> Self {
        Self {
            text: num.to_string(),
            num,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn num(&self) -> f64 {
        self.num
    }
}

#[derive(Default)]
pub struct Topic {
    /// Agent indices subscribed to this topic.
    pub subs: Vec<usize>,
    /// Agent indices publishing into this topic.
    pub pubs: Vec<usize>,
    /// Retained last message, dropped by `clear_topic`.
    pub last: Option<Message>,
}

enum Source {
    External,
    Agent(usize),
}

/// The live graph: topics keyed by name (created on first reference) plus the
/// wired agents. One instance per loaded configuration; config unload swaps
/// in an empty book.
#[derive(Default)]
pub struct TopicBook {
    topics: BTreeMap<String, Topic>,
    agents: Vec<Box<dyn FlowAgent>>,
}

impl std::fmt::Debug for TopicBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicBook")
            .field("topics", &self.topics.keys().collect::<Vec<_>>())
            .field("agents", &self.agents.len())
            .finish()
    }
}

impl TopicBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topics(&self) -> &BTreeMap<String, Topic> {
        &self.topics
    }

    pub fn topic_names(&self) -> Vec<String> {
        self.topics.keys().cloned().collect()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agent_id(&self, idx: usize) -> &str {
        self.agents[idx].id()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.agents.is_empty()
    }

    fn topic_entry(&mut self, name: &str) -> &mut Topic {
        self.topics.entry(name.to_string()).or_default()
    }

    pub fn add_agent(&mut self, agent: Box<dyn FlowAgent>, subs: &[String], pubs: &[String]) {
        let idx = self.agents.len();
        self.agents.push(agent);
        for name in subs {
            let topic = self.topic_entry(name);
            if !topic.subs.contains(&idx) {
                topic.subs.push(idx);
            }
        }
        for name in pubs {
            let topic = self.topic_entry(name);
            if !topic.pubs.contains(&idx) {
                topic.pubs.push(idx);
            }
        }
    }

    /// External publish into a topic. Delivery is queue-decoupled: agents
    /// publish into an outbox and those messages are pumped in FIFO order, so
    /// every hop lands on `events` in cause order.
    pub fn publish(&mut self, topic: &str, msg: Message, events: &mut Vec<Event>) {
        let mut pending: VecDeque<(String, Message, Source)> = VecDeque::new();
        pending.push_back((topic.to_string(), msg, Source::External));
        let mut delivered = 0usize;

        while let Some((name, msg, source)) = pending.pop_front() {
            delivered += 1;
            if delivered > MAX_CASCADE {
                tracing::warn!(topic = %name, "delivery cascade truncated");
                break;
            }

            if let Source::Agent(idx) = source {
                events.push(Event::new(
                    now_millis(),
                    EventKind::AgentPublish,
                    Some(NodeId::new(self.agents[idx].id())),
                    Some(msg.text().to_string()),
                ));
            }
            events.push(Event::new(
                now_millis(),
                EventKind::TopicPublish,
                Some(NodeId::new(&name)),
                Some(msg.text().to_string()),
            ));

            let topic = self.topic_entry(&name);
            topic.last = Some(msg.clone());
            let subs = topic.subs.clone();
            for idx in subs {
                let mut out = Outbox::default();
                self.agents[idx].on_message(&name, &msg, &mut out);
                for (out_topic, out_msg) in out.into_queued() {
                    pending.push_back((out_topic, out_msg, Source::Agent(idx)));
                }
            }
        }
    }

    /// Drops the retained value and tells subscribers to forget their latched
    /// input from this topic.
    pub fn clear_topic(&mut self, name: &str, events: &mut Vec<Event>) {
        let topic = self.topic_entry(name);
        topic.last = None;
        let subs = topic.subs.clone();
        for idx in subs {
            self.agents[idx].on_clear(name);
        }
        events.push(Event::new(
            now_millis(),
            EventKind::TopicCleared,
            Some(NodeId::new(name)),
            None,
        ));
    }
}
