use crate::models::{Citation, RetrievedPassage};

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    pub context: String,
    pub citations: Vec<Citation>,
}

/// Builds one `[Source N: locator]` block per passage, in the order given.
pub fn assemble(passages: &[RetrievedPassage]) -> AssembledContext {
    let mut blocks = Vec::with_capacity(passages.len());
    let mut citations = Vec::with_capacity(passages.len());

    for passage in passages {
        blocks.push(format!(
            "[Source {}: {}]\n{}",
            passage.rank, passage.locator, passage.text
        ));
        citations.push(Citation {
            rank: passage.rank,
            locator: passage.locator.clone(),
            url: None,
        });
    }

    AssembledContext {
        context: blocks.join(BLOCK_SEPARATOR),
        citations,
    }
}

pub fn render_sources(citations: &[Citation]) -> String {
    citations
        .iter()
        .map(Citation::render)
        .collect::<Vec<_>>()
        .join("\n")
}
