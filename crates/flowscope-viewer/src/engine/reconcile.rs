use super::{layout, Engine};
use crate::view::{NodeElement, ViewCommand};
use anyhow::Result;
use flowscope_core::{NodeInfo, NodeKind};

/// TOPIC nodes carry a two-line label (name over current overlay value,
/// blank right after a snapshot); AGENT nodes a single line.
pub fn node_label(info: &NodeInfo, value: Option<&str>) -> String {
    match info.kind {
        NodeKind::Topic => format!("{}\n{}", info.id, value.unwrap_or("")),
        NodeKind::Agent => info.id.to_string(),
    }
}

impl Engine {
    /// Fetches the full snapshot and installs it wholesale: overlay reset,
    /// pending highlight reverts cancelled, fresh element list and a layered
    /// top-down layout handed to the renderer. An empty snapshot becomes the
    /// empty-state display instead.
    pub(crate) async fn reconcile(&self) -> Result<()> {
        let (nodes, edges) = self.client.graph_snapshot().await?;

        let mut sh = self.shared();
        sh.highlight.cancel_all();

        if nodes.is_empty() {
            sh.model.replace_all(Vec::new(), Vec::new());
            drop(sh);
            self.view.send(ViewCommand::EmptyGraph);
            return Ok(());
        }

        let elements: Vec<NodeElement> = nodes
            .iter()
            .map(|n| NodeElement {
                id: n.id.clone(),
                kind: n.kind,
                label: node_label(n, None),
            })
            .collect();
        let plan = layout::layered(&nodes, &edges);
        sh.model.replace_all(nodes, edges.clone());
        drop(sh);

        self.view.send(ViewCommand::ReplaceGraph {
            nodes: elements,
            edges,
        });
        self.view.send(ViewCommand::Layout(plan));
        Ok(())
    }

    /// Manual refresh: a reconcile whose failure is surfaced to the user.
    pub async fn refresh(&self) -> Result<()> {
        match self.reconcile().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.banner(format!("failed to load graph: {e:#}"));
                Err(e)
            }
        }
    }
}
