use anyhow::Result;
use crossbeam_channel::Receiver;
use flowscope_core::Event;
use flowscope_viewer::engine::Engine;
use flowscope_viewer::net::client::ApiClient;
use flowscope_viewer::util::config;
use flowscope_viewer::view::{ViewCommand, ViewSink};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = config::load_or_default();

    let (sink, rx) = ViewSink::new();
    std::thread::spawn(move || render_loop(rx));

    let engine = Engine::new(cfg.engine(), ApiClient::new(&cfg.server_addr), sink);
    tracing::info!(server = %cfg.server_addr, "flowscope viewer starting");

    // mirror whatever is already live, then open the feed
    let _ = engine.refresh().await;
    let _ = engine.list_topics().await;
    engine.connect();

    repl(&engine).await?;

    engine.shutdown();
    Ok(())
}

fn print_help() {
    println!("commands:");
    println!("  load <file>      install a configuration from a file");
    println!("  unload           remove the active configuration");
    println!("  pub <topic> <v>  publish a value into a topic");
    println!("  clear <topic>    reset a topic's held value");
    println!("  reconnect        reopen the live feed");
    println!("  refresh          re-fetch the graph snapshot");
    println!("  topics           list current topics");
    println!("  events           show recent server-side events");
    println!("  status           show feed status");
    println!("  quit");
}

async fn repl(engine: &Arc<Engine>) -> Result<()> {
    print_help();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        match parts.next().unwrap_or("") {
            "load" => {
                let Some(path) = parts.next() else {
                    println!("usage: load <file>");
                    continue;
                };
                match tokio::fs::read_to_string(path).await {
                    Ok(text) => {
                        let _ = engine.load_config(&text).await;
                    }
                    Err(e) => println!("cannot read {path}: {e}"),
                }
            }
            "unload" => {
                let _ = engine.unload_config().await;
            }
            "pub" => {
                let topic = parts.next().unwrap_or("");
                let value = parts.next().unwrap_or("");
                let _ = engine.publish(topic, value).await;
            }
            "clear" => {
                let _ = engine.clear_topic(parts.next().unwrap_or("")).await;
            }
            "reconnect" => engine.connect(),
            "refresh" => {
                let _ = engine.refresh().await;
            }
            "topics" => {
                let _ = engine.list_topics().await;
            }
            "events" => {
                let _ = engine.fetch_recent(30).await;
            }
            "status" => println!("feed: {}", engine.status().as_str()),
            "quit" | "exit" => break,
            _ => print_help(),
        }
    }
    Ok(())
}

fn render_loop(rx: Receiver<ViewCommand>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            ViewCommand::ReplaceGraph { nodes, edges } => {
                println!("[graph] {} nodes, {} edges", nodes.len(), edges.len());
            }
            ViewCommand::EmptyGraph => println!("[graph] no configuration loaded"),
            ViewCommand::Layout(plan) => {
                let rows: Vec<String> = plan
                    .rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|id| id.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .collect();
                println!("[layout] {}", rows.join(" | "));
            }
            ViewCommand::SetNodeValue { id, value } => match value {
                Some(value) => println!("[value] {id} = {value}"),
                None => println!("[value] {id} cleared"),
            },
            ViewCommand::AddMark { id, mark, edges } => {
                println!("[mark] +{} {}{}", mark.class(), id, fmt_edges(&edges));
            }
            ViewCommand::RemoveMark { id, mark, edges } => {
                println!("[mark] -{} {}{}", mark.class(), id, fmt_edges(&edges));
            }
            ViewCommand::Status(status) => println!("[feed] {}", status.as_str()),
            ViewCommand::LogEvent(event) => println!("[event] {}", fmt_event(&event)),
            ViewCommand::History(events) => {
                for event in events {
                    println!("[history] {}", fmt_event(&event));
                }
            }
            ViewCommand::Topics(topics) => {
                if topics.is_empty() {
                    println!("[topics] (none)");
                } else {
                    println!("[topics] {}", topics.join(", "));
                }
            }
            ViewCommand::Banner(msg) => println!("[error] {msg}"),
        }
    }
}

fn fmt_edges(edges: &[flowscope_core::Edge]) -> String {
    if edges.is_empty() {
        return String::new();
    }
    let list: Vec<String> = edges
        .iter()
        .map(|e| format!("{}->{}", e.from, e.to))
        .collect();
    format!(" ({})", list.join(", "))
}

fn fmt_event(event: &Event) -> String {
    format!(
        "{} {} from {} val={}",
        fmt_time(event.ts),
        event.kind.as_str(),
        event
            .from
            .as_ref()
            .map(|n| n.as_str())
            .unwrap_or("-"),
        event.value.as_deref().unwrap_or("-"),
    )
}

fn fmt_time(ts: u64) -> String {
    let secs = ts / 1000 % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}
