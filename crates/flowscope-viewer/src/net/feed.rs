use crate::engine::Engine;
use crate::net::protocol::Incoming;
use anyhow::{bail, Context, Result};
use flowscope_core::{Event, Request, Response};
use futures_util::{SinkExt, StreamExt};
use std::sync::Weak;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Spawns the live-feed task. The returned handle doubles as the connection
/// state machine's "subscription is live" flag; aborting it is the explicit
/// close. The engine is held weakly so a dropped engine tears the feed down
/// instead of the feed keeping the engine alive.
pub(crate) fn spawn(engine: Weak<Engine>, addr: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reason = match run(&engine, &addr).await {
            Ok(()) => None,
            Err(e) => Some(format!("{e:#}")),
        };
        if let Some(engine) = engine.upgrade() {
            engine.handle_incoming(Incoming::Disconnected { reason });
        }
    })
}

async fn run(engine: &Weak<Engine>, addr: &str) -> Result<()> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connect live feed {addr}"))?;
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    framed
        .send(serde_json::to_vec(&Request::Subscribe)?.into())
        .await?;

    let first = framed
        .next()
        .await
        .context("feed closed before subscription was confirmed")??;
    let Response::Subscribed { server } = serde_json::from_slice::<Response>(&first)? else {
        bail!("unexpected subscribe response");
    };
    let Some(live) = engine.upgrade() else {
        return Ok(());
    };
    live.handle_incoming(Incoming::Connected { server });
    drop(live);

    while let Some(frame) = framed.next().await {
        let bytes = frame?;
        match serde_json::from_slice::<Event>(&bytes) {
            Ok(event) => {
                let Some(live) = engine.upgrade() else {
                    return Ok(());
                };
                live.handle_incoming(Incoming::Event(event));
            }
            // bad frame: log and keep the stream alive
            Err(e) => tracing::warn!(error = %e, "dropping malformed feed frame"),
        }
    }

    Ok(())
}
