use crate::graph::Message;
use anyhow::{bail, Result};

/// A processing node. Implementations receive messages on the topics they
/// subscribe to and publish results through the [`Outbox`]; they never touch
/// the topic book directly, which keeps delivery order in one place.
pub trait FlowAgent: Send {
    /// Deterministic wiring id, also the agent's node id in snapshots.
    fn id(&self) -> &str;
    fn on_message(&mut self, topic: &str, msg: &Message, out: &mut Outbox);
    fn on_clear(&mut self, topic: &str);
}

/// Publishes collected during one delivery, drained into the pump queue.
#[derive(Default)]
pub struct Outbox {
    queued: Vec<(String, Message)>,
}

impl Outbox {
    pub fn publish(&mut self, topic: impl Into<String>, msg: Message) {
        self.queued.push((topic.into(), msg));
    }

    pub(crate) fn into_queued(self) -> Vec<(String, Message)> {
        self.queued
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Inc,
    Dec,
    Plus,
    Mul,
}

impl AgentKind {
    /// Accepts bare tokens ("plus"), dotted legacy class names
    /// ("configs.PlusAgent") and an optional "agent" suffix, case-insensitive.
    pub fn parse(token: &str) -> Option<Self> {
        let last = token.rsplit('.').next().unwrap_or(token);
        let norm = last.trim().to_ascii_lowercase();
        let norm = norm.strip_suffix("agent").unwrap_or(&norm);
        match norm {
            "inc" | "increment" => Some(Self::Inc),
            "dec" | "decrement" => Some(Self::Dec),
            "plus" | "add" => Some(Self::Plus),
            "mul" | "multiply" => Some(Self::Mul),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Inc => "inc",
            Self::Dec => "dec",
            Self::Plus => "plus",
            Self::Mul => "mul",
        }
    }

    pub fn build(self, subs: &[String], pubs: &[String]) -> Result<Box<dyn FlowAgent>> {
        let id = wiring_id(self, subs, pubs);
        match self {
            Self::Inc | Self::Dec => {
                if subs.len() != 1 || pubs.len() != 1 {
                    bail!("{} expects 1 input and 1 output topic", self.token());
                }
                let delta = if self == Self::Inc { 1.0 } else { -1.0 };
                Ok(Box::new(UnaryAgent {
                    id,
                    output: pubs[0].clone(),
                    delta,
                }))
            }
            Self::Plus | Self::Mul => {
                if subs.len() != 2 || pubs.len() != 1 {
                    bail!("{} expects 2 input topics and 1 output topic", self.token());
                }
                let op: fn(f64, f64) -> f64 = if self == Self::Plus {
                    |x, y| x + y
                } else {
                    |x, y| x * y
                };
                Ok(Box::new(BinOpAgent {
                    id,
                    in1: subs[0].clone(),
                    in2: subs[1].clone(),
                    output: pubs[0].clone(),
                    op,
                    x: 0.0,
                    y: 0.0,
                    has_x: false,
                    has_y: false,
                }))
            }
        }
    }
}

fn wiring_id(kind: AgentKind, subs: &[String], pubs: &[String]) -> String {
    format!("{}[{}->{}]", kind.token(), subs.join(","), pubs.join(","))
}

/// Stateless one-in one-out arithmetic (inc, dec).
struct UnaryAgent {
    id: String,
    output: String,
    delta: f64,
}

impl FlowAgent for UnaryAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_message(&mut self, _topic: &str, msg: &Message, out: &mut Outbox) {
        if msg.num().is_nan() {
            return;
        }
        out.publish(&self.output, Message::from_double(msg.num() + self.delta));
    }

    fn on_clear(&mut self, _topic: &str) {}
}

/// Two-operand agent: latches each input as it arrives, fires once both are
/// present, and keeps firing on every later update until an input is cleared.
struct BinOpAgent {
    id: String,
    in1: String,
    in2: String,
    output: String,
    op: fn(f64, f64) -> f64,
    x: f64,
    y: f64,
    has_x: bool,
    has_y: bool,
}

impl FlowAgent for BinOpAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_message(&mut self, topic: &str, msg: &Message, out: &mut Outbox) {
        if msg.num().is_nan() {
            return;
        }
        if topic == self.in1 {
            self.x = msg.num();
            self.has_x = true;
        } else if topic == self.in2 {
            self.y = msg.num();
            self.has_y = true;
        }
        if self.has_x && self.has_y {
            out.publish(&self.output, Message::from_double((self.op)(self.x, self.y)));
        }
    }

    fn on_clear(&mut self, topic: &str) {
        if topic == self.in1 {
            self.has_x = false;
        } else if topic == self.in2 {
            self.has_y = false;
        }
    }
}
