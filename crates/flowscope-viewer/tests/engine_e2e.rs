use crossbeam_channel::Receiver;
use flowscope_core::{now_millis, Event, EventKind, NodeId, Request, Response};
use flowscope_server::server::{self, ServerState};
use flowscope_viewer::engine::{ConnectionStatus, Engine, EngineConfig};
use flowscope_viewer::net::client::ApiClient;
use flowscope_viewer::view::{Mark, ViewCommand, ViewSink};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

const PLUS_INC: &str = "plus\nA,B\nC\ninc\nC\nD\n";

async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    let state = Arc::new(Mutex::new(ServerState::new()));
    let (bus, _keep) = broadcast::channel(256);
    tokio::spawn(async move {
        let _ = server::run(listener, state, bus, "test-server".to_string()).await;
    });
    addr
}

fn fast_engine(addr: &str) -> (Arc<Engine>, Receiver<ViewCommand>) {
    let cfg = EngineConfig {
        pacing: Duration::from_millis(50),
        active_mark: Duration::from_millis(60),
        cleared_mark: Duration::from_millis(40),
        log_capacity: 64,
    };
    let (sink, rx) = ViewSink::new();
    (Engine::new(cfg, ApiClient::new(addr), sink), rx)
}

fn wait_for<F>(rx: &Receiver<ViewCommand>, what: &str, mut pred: F) -> ViewCommand
where
    F: FnMut(&ViewCommand) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(cmd) if pred(&cmd) => return cmd,
            Ok(_) => continue,
            Err(_) => panic!("timed out waiting for {what}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn load_publish_drain_clear_pipeline() {
    let addr = start_server().await;
    let (engine, rx) = fast_engine(&addr);

    engine.load_config(PLUS_INC).await.expect("load config");

    wait_for(&rx, "synthetic CONFIG_LOADED", |cmd| {
        matches!(cmd, ViewCommand::LogEvent(ev) if ev.kind == EventKind::ConfigLoaded)
    });
    let replaced = wait_for(&rx, "graph replace", |cmd| {
        matches!(cmd, ViewCommand::ReplaceGraph { .. })
    });
    let ViewCommand::ReplaceGraph { nodes, edges } = replaced else {
        unreachable!();
    };
    assert_eq!(nodes.len(), 6); // A B C D + plus + inc
    assert_eq!(edges.len(), 5);

    let layout = wait_for(&rx, "layout", |cmd| matches!(cmd, ViewCommand::Layout(_)));
    let ViewCommand::Layout(plan) = layout else {
        unreachable!();
    };
    let roots: Vec<&str> = plan.rows[0].iter().map(NodeId::as_str).collect();
    assert_eq!(roots, vec!["A", "B"]);

    wait_for(&rx, "feed connect", |cmd| {
        matches!(cmd, ViewCommand::Status(ConnectionStatus::Connected))
    });

    engine.publish("A", "5").await.expect("publish A");
    // one drained event: overlay write, then the active mark, then the log line
    let mark = wait_for(&rx, "active mark on A", |cmd| {
        matches!(
            cmd,
            ViewCommand::AddMark { id, mark: Mark::Active, .. } if id == &NodeId::new("A")
        )
    });
    let ViewCommand::AddMark { edges, .. } = mark else {
        unreachable!();
    };
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to, NodeId::new("plus[A,B->C]"));
    wait_for(&rx, "drained publish on A", |cmd| {
        matches!(
            cmd,
            ViewCommand::LogEvent(ev)
                if ev.kind == EventKind::TopicPublish
                    && ev.from == Some(NodeId::new("A"))
                    && ev.value.as_deref() == Some("5")
        )
    });

    // second operand completes the cascade down to D = 14
    engine.publish("B", "8").await.expect("publish B");
    wait_for(&rx, "cascade reaches D", |cmd| {
        matches!(
            cmd,
            ViewCommand::SetNodeValue { id, value }
                if id == &NodeId::new("D") && value.as_deref() == Some("14")
        )
    });

    engine.clear_topic("D").await.expect("clear D");
    wait_for(&rx, "overlay cleared on D", |cmd| {
        matches!(
            cmd,
            ViewCommand::SetNodeValue { id, value: None } if id == &NodeId::new("D")
        )
    });
    wait_for(&rx, "cleared mark on D", |cmd| {
        matches!(
            cmd,
            ViewCommand::AddMark { id, mark: Mark::Cleared, .. } if id == &NodeId::new("D")
        )
    });

    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn redundant_connects_share_one_subscription() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    let subscriptions = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&subscriptions);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
                let Some(Ok(bytes)) = framed.next().await else {
                    return;
                };
                if matches!(
                    serde_json::from_slice::<Request>(&bytes),
                    Ok(Request::Subscribe)
                ) {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let resp = Response::Subscribed {
                        server: "fake".to_string(),
                    };
                    let payload = serde_json::to_vec(&resp).expect("encode");
                    let _ = framed.send(payload.into()).await;
                    // hold the feed open until the client goes away
                    while framed.next().await.is_some() {}
                }
            });
        }
    });

    let (engine, rx) = fast_engine(&addr);
    engine.connect();
    engine.connect();
    wait_for(&rx, "feed connect", |cmd| {
        matches!(cmd, ViewCommand::Status(ConnectionStatus::Connected))
    });
    engine.connect();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(subscriptions.load(Ordering::SeqCst), 1);

    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unload_purges_queue_and_reconciles_empty() {
    let addr = start_server().await;

    // glacial pacing so published events stay queued
    let cfg = EngineConfig {
        pacing: Duration::from_secs(30),
        ..EngineConfig::default()
    };
    let (sink, rx) = ViewSink::new();
    let engine = Engine::new(cfg, ApiClient::new(&addr), sink);

    engine.load_config(PLUS_INC).await.expect("load config");
    wait_for(&rx, "feed connect", |cmd| {
        matches!(cmd, ViewCommand::Status(ConnectionStatus::Connected))
    });

    for value in ["1", "2", "3"] {
        engine.publish("A", value).await.expect("publish");
    }
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.queue_len() < 3 {
        assert!(Instant::now() < deadline, "events never reached the queue");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    engine.unload_config().await.expect("unload");

    assert_eq!(engine.queue_len(), 0);
    assert_eq!(engine.status(), ConnectionStatus::Disconnected);
    assert!(engine
        .event_log()
        .iter()
        .any(|ev| ev.kind == EventKind::ConfigUnloaded));
    wait_for(&rx, "empty graph", |cmd| {
        matches!(cmd, ViewCommand::EmptyGraph)
    });

    engine.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_feed_frames_are_dropped_not_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
        let _ = framed.next().await; // Subscribe
        let resp = Response::Subscribed {
            server: "fake".to_string(),
        };
        let payload = serde_json::to_vec(&resp).expect("encode");
        framed.send(payload.into()).await.expect("send subscribed");

        framed
            .send(b"this is not json".to_vec().into())
            .await
            .expect("send garbage");
        let event = Event::new(
            now_millis(),
            EventKind::TopicPublish,
            Some(NodeId::new("X")),
            Some("1".to_string()),
        );
        let payload = serde_json::to_vec(&event).expect("encode event");
        framed.send(payload.into()).await.expect("send event");

        // keep the stream open
        while framed.next().await.is_some() {}
    });

    let (engine, rx) = fast_engine(&addr);
    engine.connect();

    wait_for(&rx, "event after garbage frame", |cmd| {
        matches!(
            cmd,
            ViewCommand::LogEvent(ev) if ev.from == Some(NodeId::new("X"))
        )
    });
    assert_eq!(engine.status(), ConnectionStatus::Connected);

    engine.shutdown();
}
