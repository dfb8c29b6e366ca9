use super::{ConnectionStatus, Engine};
use crate::view::ViewCommand;
use anyhow::{bail, Result};
use flowscope_core::{EventKind, ValueSpec};

/// User intents. Local validation failures are rejected before any network
/// call; request failures surface once as a banner and the operation is
/// abandoned without retry or partial state.
impl Engine {
    /// Install a configuration: ack from the server, synthetic CONFIG_LOADED
    /// in the log, snapshot reconcile, and only then the feed connect, so no
    /// drained event can predate the node set it refers to.
    pub async fn load_config(&self, config_text: &str) -> Result<()> {
        if config_text.trim().is_empty() {
            self.banner("config text is empty");
            bail!("config text is empty");
        }
        if let Err(e) = self.client.config_load(config_text).await {
            self.banner(format!("load config failed: {e:#}"));
            return Err(e);
        }
        self.log_synthetic(EventKind::ConfigLoaded);
        self.refresh().await?;
        self.connect();
        Ok(())
    }

    /// Tear the active configuration down. The feed is closed first and the
    /// queue purged with it (stale events must not replay against the
    /// emptied mirror), then overlays drop and the empty snapshot is
    /// reconciled in.
    pub async fn unload_config(&self) -> Result<()> {
        self.disconnect();
        self.purge_queue();
        self.shared().model.clear_values();

        if let Err(e) = self.client.config_unload().await {
            self.banner(format!("unload config failed: {e:#}"));
            return Err(e);
        }
        self.log_synthetic(EventKind::ConfigUnloaded);
        self.refresh().await
    }

    /// Publishing needs a topic and an active session; anything else is a
    /// user error, not a silent no-op.
    pub async fn publish(&self, topic: &str, value: &str) -> Result<()> {
        if topic.trim().is_empty() {
            self.banner("topic is required");
            bail!("topic is required");
        }
        if self.status() != ConnectionStatus::Connected {
            self.banner("not connected: reconnect before publishing");
            bail!("publish while disconnected");
        }
        if let Err(e) = self
            .client
            .topic_publish(topic, ValueSpec::double(value))
            .await
        {
            self.banner(format!("publish failed: {e:#}"));
            return Err(e);
        }
        Ok(())
    }

    /// Fire-and-forget; a failure is surfaced once and dropped.
    pub async fn clear_topic(&self, topic: &str) -> Result<()> {
        if topic.trim().is_empty() {
            self.banner("topic is required");
            bail!("topic is required");
        }
        if let Err(e) = self.client.topic_clear(topic).await {
            self.banner(format!("clear failed: {e:#}"));
            return Err(e);
        }
        Ok(())
    }

    pub async fn list_topics(&self) -> Result<()> {
        match self.client.topics_list().await {
            Ok(topics) => {
                self.view.send(ViewCommand::Topics(topics));
                Ok(())
            }
            Err(e) => {
                self.banner(format!("failed to load topics: {e:#}"));
                Err(e)
            }
        }
    }

    /// Server-side event history, shown alongside the live log.
    pub async fn fetch_recent(&self, limit: usize) -> Result<()> {
        match self.client.events_recent(limit).await {
            Ok(events) => {
                self.view.send(ViewCommand::History(events));
                Ok(())
            }
            Err(e) => {
                self.banner(format!("failed to load events: {e:#}"));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::net::client::ApiClient;
    use crate::view::{ViewCommand, ViewSink};
    use crossbeam_channel::Receiver;
    use std::sync::Arc;

    fn engine() -> (Arc<Engine>, Receiver<ViewCommand>) {
        let (sink, rx) = ViewSink::new();
        // never dialled by the local-validation paths under test
        let engine = Engine::new(
            EngineConfig::default(),
            ApiClient::new("127.0.0.1:1"),
            sink,
        );
        (engine, rx)
    }

    fn banners(rx: &Receiver<ViewCommand>) -> Vec<String> {
        rx.try_iter()
            .filter_map(|cmd| match cmd {
                ViewCommand::Banner(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_config_text_is_rejected_locally() {
        let (engine, rx) = engine();
        let err = engine.load_config("  \n ").await.expect_err("must fail");
        assert_eq!(err.to_string(), "config text is empty");
        assert_eq!(banners(&rx), vec!["config text is empty".to_string()]);
        // nothing was logged: the synthetic event only follows a server ack
        assert!(engine.event_log().is_empty());
    }

    #[tokio::test]
    async fn publish_requires_topic_and_connection() {
        let (engine, rx) = engine();

        let err = engine.publish("  ", "5").await.expect_err("must fail");
        assert_eq!(err.to_string(), "topic is required");

        let err = engine.publish("A", "5").await.expect_err("must fail");
        assert_eq!(err.to_string(), "publish while disconnected");

        let banners = banners(&rx);
        assert_eq!(banners.len(), 2);
        assert!(banners[1].contains("not connected"));
    }

    #[tokio::test]
    async fn clear_requires_topic() {
        let (engine, rx) = engine();
        assert!(engine.clear_topic("").await.is_err());
        assert_eq!(banners(&rx), vec!["topic is required".to_string()]);
    }
}
