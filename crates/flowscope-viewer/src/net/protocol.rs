use flowscope_core::Event;

/// What the feed task reports back to the engine: the connection state
/// transitions it observed, plus every event frame it could parse.
#[derive(Debug, Clone)]
pub enum Incoming {
    Connected { server: String },
    Event(Event),
    Disconnected { reason: Option<String> },
}
