use flowscope_core::{Edge, NodeId, NodeInfo};
use std::collections::{HashMap, HashSet, VecDeque};

/// Layered top-down placement request: row 0 holds the flow sources, each
/// following row the nodes first reached one hop further downstream. The
/// renderer spaces the rows across its viewport and fits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    pub rows: Vec<Vec<NodeId>>,
}

/// Breadth-first ranks by edge direction from every in-degree-zero root.
/// Nodes unreachable from any root (pure cycles) are appended as a final
/// row so nothing disappears from the display.
pub fn layered(nodes: &[NodeInfo], edges: &[Edge]) -> LayoutPlan {
    let mut adjacency: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    let mut in_degree: HashMap<&NodeId, usize> = nodes.iter().map(|n| (&n.id, 0)).collect();
    for edge in edges {
        adjacency.entry(&edge.from).or_default().push(&edge.to);
        if let Some(d) = in_degree.get_mut(&edge.to) {
            *d += 1;
        }
    }

    let mut roots: Vec<&NodeId> = nodes
        .iter()
        .map(|n| &n.id)
        .filter(|id| in_degree.get(*id) == Some(&0))
        .collect();
    roots.sort();

    let mut rows: Vec<Vec<NodeId>> = Vec::new();
    let mut visited: HashSet<&NodeId> = roots.iter().copied().collect();
    let mut frontier: VecDeque<(&NodeId, usize)> = roots.iter().map(|id| (*id, 0)).collect();

    while let Some((id, rank)) = frontier.pop_front() {
        if rows.len() <= rank {
            rows.push(Vec::new());
        }
        rows[rank].push(id.clone());
        if let Some(next) = adjacency.get(id) {
            for to in next {
                if visited.insert(to) {
                    frontier.push_back((to, rank + 1));
                }
            }
        }
    }

    let mut leftover: Vec<NodeId> = nodes
        .iter()
        .map(|n| &n.id)
        .filter(|id| !visited.contains(*id))
        .cloned()
        .collect();
    if !leftover.is_empty() {
        leftover.sort();
        rows.push(leftover);
    }

    LayoutPlan { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowscope_core::NodeKind;

    fn node(id: &str, kind: NodeKind) -> NodeInfo {
        NodeInfo {
            id: NodeId::new(id),
            kind,
        }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            from: NodeId::new(from),
            to: NodeId::new(to),
        }
    }

    fn ids(row: &[NodeId]) -> Vec<&str> {
        row.iter().map(NodeId::as_str).collect()
    }

    #[test]
    fn chain_ranks_one_per_row() {
        let nodes = vec![
            node("A", NodeKind::Topic),
            node("Sum", NodeKind::Agent),
            node("B", NodeKind::Topic),
        ];
        let edges = vec![edge("A", "Sum"), edge("Sum", "B")];
        let plan = layered(&nodes, &edges);
        assert_eq!(plan.rows.len(), 3);
        assert_eq!(ids(&plan.rows[0]), vec!["A"]);
        assert_eq!(ids(&plan.rows[1]), vec!["Sum"]);
        assert_eq!(ids(&plan.rows[2]), vec!["B"]);
    }

    #[test]
    fn two_roots_share_the_first_row() {
        let nodes = vec![
            node("B", NodeKind::Topic),
            node("A", NodeKind::Topic),
            node("plus", NodeKind::Agent),
            node("C", NodeKind::Topic),
        ];
        let edges = vec![edge("A", "plus"), edge("B", "plus"), edge("plus", "C")];
        let plan = layered(&nodes, &edges);
        assert_eq!(ids(&plan.rows[0]), vec!["A", "B"]);
        assert_eq!(ids(&plan.rows[1]), vec!["plus"]);
        assert_eq!(ids(&plan.rows[2]), vec!["C"]);
    }

    #[test]
    fn pure_cycle_is_not_lost() {
        let nodes = vec![node("X", NodeKind::Topic), node("Y", NodeKind::Topic)];
        let edges = vec![edge("X", "Y"), edge("Y", "X")];
        let plan = layered(&nodes, &edges);
        let total: usize = plan.rows.iter().map(Vec::len).sum();
        assert_eq!(total, 2);
    }
}
