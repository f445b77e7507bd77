//! Citation records and the context handed to the generator

use crate::retrieval::{deduplicate_chunks, ScoredChunk};
use serde::{Deserialize, Serialize};

/// A retrieved chunk tagged with its rank and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in the context list
    pub rank: usize,

    pub text: String,

    /// Originating document
    pub source: String,

    pub title: String,

    /// Score the strategy ranked by
    pub score: f32,
}

impl Citation {
    /// De-duplicate ranked results and number them from 1
    pub fn from_ranked(results: Vec<ScoredChunk>) -> Vec<Citation> {
        deduplicate_chunks(results)
            .into_iter()
            .enumerate()
            .map(|(i, scored)| Citation {
                rank: i + 1,
                text: scored.chunk.text,
                source: scored.chunk.source,
                title: scored.chunk.title,
                score: scored.score,
            })
            .collect()
    }

    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            self.text.clone()
        } else {
            let head: String = self.text.chars().take(max_chars).collect();
            format!("{}...", head)
        }
    }
}

/// Ordered citations plus the query they answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPack {
    pub query: String,
    pub citations: Vec<Citation>,
}

impl ContextPack {
    pub fn new(query: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            query: query.into(),
            citations,
        }
    }

    /// Numbered-context prompt for the generator
    pub fn render_prompt(&self, system_hint: Option<&str>) -> String {
        let context_block = self
            .citations
            .iter()
            .map(|c| format!("[{}] {}", c.rank, c.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "{}\n\nContext:\n{}\n\nQuestion: {}\nAnswer (cite sources like [1], [2]; say \"I don't know\" if not in context):",
            system_hint.unwrap_or(""),
            context_block,
            self.query
        )
    }

    /// One-line source list, e.g. `Sources: [1] intro  [2] setup`
    pub fn sources_footer(&self) -> String {
        if self.citations.is_empty() {
            return String::new();
        }
        let sources = self
            .citations
            .iter()
            .map(|c| {
                let label = if c.title.is_empty() { &c.source } else { &c.title };
                format!("[{}] {}", c.rank, label)
            })
            .collect::<Vec<_>>()
            .join("  ");
        format!("Sources: {}", sources)
    }
}

/// Append the last two (user, assistant) turns to a question
///
/// Retrieval then sees the conversation the question refers back to.
pub fn fold_chat_history(question: &str, history: &[(String, String)]) -> String {
    if history.is_empty() {
        return question.to_string();
    }

    let start = history.len().saturating_sub(2);
    let turns = history[start..]
        .iter()
        .map(|(user, assistant)| format!("User: {}\nAssistant: {}", user, assistant))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{}\n\nConversation context:\n{}\n", question, turns)
}
