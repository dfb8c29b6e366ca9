use crate::agents::AgentKind;
use crate::graph::TopicBook;
use anyhow::{anyhow, bail, Result};

/// Builds a fresh topic book from configuration text: stanzas of three
/// non-blank lines (agent kind, subscribe topics CSV, publish topics CSV).
/// Returns the complete book or an error; the caller swaps it in wholesale so
/// a bad config never leaves partial wiring behind.
pub fn build_from_text(text: &str) -> Result<TopicBook> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() % 3 != 0 {
        bail!(
            "config stanzas are 3 lines each (agent kind, subscribes, publishes); got {} lines",
            lines.len()
        );
    }

    let mut book = TopicBook::new();
    for stanza in lines.chunks(3) {
        let kind =
            AgentKind::parse(stanza[0]).ok_or_else(|| anyhow!("unknown agent kind: {}", stanza[0]))?;
        let subs = split_topics(stanza[1]);
        let pubs = split_topics(stanza[2]);
        let agent = kind.build(&subs, &pubs)?;
        book.add_agent(agent, &subs, &pubs);
    }
    Ok(book)
}

fn split_topics(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
