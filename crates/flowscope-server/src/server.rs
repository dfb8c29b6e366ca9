use crate::graph::{Message, TopicBook};
use crate::{snapshot, wiring};
use anyhow::Result;
use flowscope_core::{Event, Request, Response, ValueKind};
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

const RECENT_CAP: usize = 500;

pub struct ServerState {
    pub book: TopicBook,
    recent: VecDeque<Event>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            book: TopicBook::new(),
            recent: VecDeque::new(),
        }
    }

    fn record(&mut self, events: Vec<Event>, bus: &broadcast::Sender<Event>) {
        for event in events {
            self.recent.push_back(event.clone());
            while self.recent.len() > RECENT_CAP {
                self.recent.pop_front();
            }
            // no subscribers is fine
            let _ = bus.send(event);
        }
    }

    fn recent_tail(&self, limit: usize) -> Vec<Event> {
        let skip = self.recent.len().saturating_sub(limit);
        self.recent.iter().skip(skip).cloned().collect()
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run(
    listener: TcpListener,
    state: Arc<Mutex<ServerState>>,
    bus: broadcast::Sender<Event>,
    server_name: String,
) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "client connected");
        let state = Arc::clone(&state);
        let bus = bus.clone();
        let server_name = server_name.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_conn(stream, state, bus, server_name).await {
                tracing::debug!(%peer, error = %e, "connection closed");
            }
        });
    }
}

async fn handle_conn(
    stream: TcpStream,
    state: Arc<Mutex<ServerState>>,
    bus: broadcast::Sender<Event>,
    server_name: String,
) -> Result<()> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    let Some(frame) = framed.next().await else {
        return Ok(());
    };
    let bytes = frame?;
    let request = match serde_json::from_slice::<Request>(&bytes) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "malformed request frame");
            let resp = Response::err(format!("malformed request: {e}"));
            framed.send(serde_json::to_vec(&resp)?.into()).await?;
            return Ok(());
        }
    };

    match request {
        Request::Subscribe => {
            let mut rx = bus.subscribe();
            let resp = Response::Subscribed {
                server: server_name,
            };
            framed.send(serde_json::to_vec(&resp)?.into()).await?;

            loop {
                match rx.recv().await {
                    // feed frames are raw events, one JSON object per frame
                    Ok(event) => framed.send(serde_json::to_vec(&event)?.into()).await?,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            Ok(())
        }
        request => {
            let response = {
                let mut st = state.lock().unwrap_or_else(PoisonError::into_inner);
                handle_request(request, &mut st, &bus)
            };
            framed.send(serde_json::to_vec(&response)?.into()).await?;
            Ok(())
        }
    }
}

fn handle_request(
    request: Request,
    st: &mut ServerState,
    bus: &broadcast::Sender<Event>,
) -> Response {
    match request {
        Request::ConfigLoad { config_text } => match wiring::build_from_text(&config_text) {
            Ok(book) => {
                tracing::info!(
                    topics = book.topic_names().len(),
                    agents = book.agent_count(),
                    "configuration loaded"
                );
                st.book = book;
                Response::ok()
            }
            Err(e) => Response::err(e.to_string()),
        },
        Request::ConfigUnload => {
            st.book = TopicBook::new();
            tracing::info!("configuration unloaded");
            Response::ok()
        }
        Request::TopicsList => Response::Topics {
            topics: st.book.topic_names(),
        },
        Request::GraphSnapshot => {
            let (nodes, edges) = snapshot::build(&st.book);
            Response::Snapshot { nodes, edges }
        }
        Request::TopicPublish { topic, body } => {
            let msg = match body.kind {
                ValueKind::Double => match body.value.trim().parse::<f64>() {
                    Ok(v) => Message::from_double(v),
                    Err(_) => return Response::err(format!("invalid double: {}", body.value)),
                },
                ValueKind::Text => Message::from_text(body.value),
            };
            let mut events = Vec::new();
            st.book.publish(&topic, msg, &mut events);
            st.record(events, bus);
            Response::ok()
        }
        Request::TopicClear { topic } => {
            let mut events = Vec::new();
            st.book.clear_topic(&topic, &mut events);
            st.record(events, bus);
            Response::ok()
        }
        Request::EventsRecent { limit } => Response::Events {
            events: st.recent_tail(limit),
        },
        // handled by the connection loop before we get here
        Request::Subscribe => Response::err("subscribe is a stream request"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowscope_core::{EventKind, ValueSpec};

    fn publish(st: &mut ServerState, bus: &broadcast::Sender<Event>, topic: &str, value: &str) {
        let resp = handle_request(
            Request::TopicPublish {
                topic: topic.to_string(),
                body: ValueSpec::double(value),
            },
            st,
            bus,
        );
        assert!(matches!(resp, Response::Ack { ok: true, .. }));
    }

    #[test]
    fn load_publish_snapshot_round() {
        let (bus, mut rx) = broadcast::channel(64);
        let mut st = ServerState::new();

        let resp = handle_request(
            Request::ConfigLoad {
                config_text: "plus\nA,B\nC\n".to_string(),
            },
            &mut st,
            &bus,
        );
        assert!(matches!(resp, Response::Ack { ok: true, .. }));

        publish(&mut st, &bus, "A", "5");
        publish(&mut st, &bus, "B", "8");

        // bus saw the full cascade, ending with C receiving 13
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push((ev.kind, ev.from.map(|n| n.0).unwrap_or_default(), ev.value));
        }
        assert_eq!(
            kinds.last(),
            Some(&(
                EventKind::TopicPublish,
                "C".to_string(),
                Some("13".to_string())
            ))
        );

        let resp = handle_request(Request::GraphSnapshot, &mut st, &bus);
        let Response::Snapshot { nodes, edges } = resp else {
            panic!("expected snapshot");
        };
        assert_eq!(nodes.len(), 4);
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn bad_config_leaves_previous_wiring_intact() {
        let (bus, _rx) = broadcast::channel(8);
        let mut st = ServerState::new();

        let resp = handle_request(
            Request::ConfigLoad {
                config_text: "inc\nA\nB\n".to_string(),
            },
            &mut st,
            &bus,
        );
        assert!(matches!(resp, Response::Ack { ok: true, .. }));

        let resp = handle_request(
            Request::ConfigLoad {
                config_text: "inc\nA\n".to_string(),
            },
            &mut st,
            &bus,
        );
        assert!(matches!(resp, Response::Ack { ok: false, .. }));
        assert_eq!(st.book.topic_names(), vec!["A", "B"]);
    }

    #[test]
    fn invalid_double_is_rejected_in_ack() {
        let (bus, _rx) = broadcast::channel(8);
        let mut st = ServerState::new();
        let resp = handle_request(
            Request::TopicPublish {
                topic: "A".to_string(),
                body: ValueSpec::double("five"),
            },
            &mut st,
            &bus,
        );
        let Response::Ack { ok, error } = resp else {
            panic!("expected ack");
        };
        assert!(!ok);
        assert!(error.unwrap_or_default().contains("invalid double"));
    }

    #[test]
    fn recent_events_tail_respects_limit() {
        let (bus, _rx) = broadcast::channel(64);
        let mut st = ServerState::new();
        handle_request(
            Request::ConfigLoad {
                config_text: "inc\nA\nB\n".to_string(),
            },
            &mut st,
            &bus,
        );
        for i in 0..5 {
            publish(&mut st, &bus, "A", &i.to_string());
        }
        let resp = handle_request(Request::EventsRecent { limit: 3 }, &mut st, &bus);
        let Response::Events { events } = resp else {
            panic!("expected events");
        };
        assert_eq!(events.len(), 3);
    }
}
