use crate::graph::TopicBook;
use flowscope_core::{Edge, NodeId, NodeInfo, NodeKind};

/// Builds the full node/edge snapshot from the live book: one TOPIC node per
/// topic, one AGENT node per wired agent, a topic→agent edge per subscription
/// and an agent→topic edge per publication. Topics come out name-sorted,
/// agents in wiring order, so snapshots are deterministic.
pub fn build(book: &TopicBook) -> (Vec<NodeInfo>, Vec<Edge>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for (name, topic) in book.topics() {
        nodes.push(NodeInfo {
            id: NodeId::new(name),
            kind: NodeKind::Topic,
        });
        for &idx in &topic.subs {
            edges.push(Edge {
                from: NodeId::new(name),
                to: NodeId::new(book.agent_id(idx)),
            });
        }
        for &idx in &topic.pubs {
            edges.push(Edge {
                from: NodeId::new(book.agent_id(idx)),
                to: NodeId::new(name),
            });
        }
    }

    for idx in 0..book.agent_count() {
        nodes.push(NodeInfo {
            id: NodeId::new(book.agent_id(idx)),
            kind: NodeKind::Agent,
        });
    }

    (nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiring;

    #[test]
    fn snapshot_reflects_wiring_direction() {
        let book = wiring::build_from_text("plus\nA,B\nC\n").expect("wiring");
        let (nodes, edges) = build(&book);

        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "plus[A,B->C]"]);

        let topic_kinds: Vec<NodeKind> = nodes.iter().map(|n| n.kind).collect();
        assert_eq!(
            topic_kinds,
            vec![
                NodeKind::Topic,
                NodeKind::Topic,
                NodeKind::Topic,
                NodeKind::Agent
            ]
        );

        let pairs: Vec<(&str, &str)> = edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("A", "plus[A,B->C]"),
                ("B", "plus[A,B->C]"),
                ("plus[A,B->C]", "C"),
            ]
        );
    }

    #[test]
    fn empty_book_yields_empty_snapshot() {
        let book = TopicBook::new();
        let (nodes, edges) = build(&book);
        assert!(nodes.is_empty());
        assert!(edges.is_empty());
    }
}
