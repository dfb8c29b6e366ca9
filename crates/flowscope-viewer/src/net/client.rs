use anyhow::{bail, Context, Result};
use flowscope_core::{Edge, Event, NodeInfo, Request, Response, ValueSpec};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Request/response calls, HTTP-style: one connection, one framed JSON
/// request, one framed JSON response. The live feed has its own path.
#[derive(Debug, Clone)]
pub struct ApiClient {
    addr: String,
}

impl ApiClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, request: &Request) -> Result<Response> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .with_context(|| format!("connect {}", self.addr))?;
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
        framed.send(serde_json::to_vec(request)?.into()).await?;
        let frame = framed
            .next()
            .await
            .context("server closed without a response")??;
        Ok(serde_json::from_slice(&frame)?)
    }

    async fn call_ack(&self, request: &Request) -> Result<()> {
        match self.call(request).await? {
            Response::Ack { ok: true, .. } => Ok(()),
            Response::Ack { ok: false, error } => {
                bail!("{}", error.unwrap_or_else(|| "unknown error".to_string()))
            }
            other => bail!("unexpected response: {other:?}"),
        }
    }

    pub async fn config_load(&self, config_text: &str) -> Result<()> {
        self.call_ack(&Request::ConfigLoad {
            config_text: config_text.to_string(),
        })
        .await
    }

    pub async fn config_unload(&self) -> Result<()> {
        self.call_ack(&Request::ConfigUnload).await
    }

    pub async fn topics_list(&self) -> Result<Vec<String>> {
        match self.call(&Request::TopicsList).await? {
            Response::Topics { topics } => Ok(topics),
            other => bail!("unexpected response: {other:?}"),
        }
    }

    pub async fn graph_snapshot(&self) -> Result<(Vec<NodeInfo>, Vec<Edge>)> {
        match self.call(&Request::GraphSnapshot).await? {
            Response::Snapshot { nodes, edges } => Ok((nodes, edges)),
            other => bail!("unexpected response: {other:?}"),
        }
    }

    pub async fn topic_publish(&self, topic: &str, body: ValueSpec) -> Result<()> {
        self.call_ack(&Request::TopicPublish {
            topic: topic.to_string(),
            body,
        })
        .await
    }

    pub async fn topic_clear(&self, topic: &str) -> Result<()> {
        self.call_ack(&Request::TopicClear {
            topic: topic.to_string(),
        })
        .await
    }

    pub async fn events_recent(&self, limit: usize) -> Result<Vec<Event>> {
        match self.call(&Request::EventsRecent { limit }).await? {
            Response::Events { events } => Ok(events),
            other => bail!("unexpected response: {other:?}"),
        }
    }
}
