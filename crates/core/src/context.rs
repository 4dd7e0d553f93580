//! # Context Assembly
//!
//! Builds the prompt context for one agent invocation. Composition order is
//! fixed: agent instructions and Golden Rules, then prior-phase or
//! dependency outputs, then retrieved chunks truncated to a character
//! budget, then the optional project-structure summary used by Q&A
//! questions.

use crate::agents::{prompts, AgentSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Separator between injected retrieval chunks
const CHUNK_SEPARATOR: &str = "\n---\n";

/// One retrieved chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub score: f64,
    pub source: String,
}

/// Retrieval collaborator: `query(text, top_k)` returns ranked chunks.
/// Deterministic given the same store state, side-effect-free.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn query(&self, text: &str, top_k: usize) -> anyhow::Result<Vec<Chunk>>;
}

/// In-process retriever ranked by keyword overlap
///
/// Deliberately embedding-free: scoring is term overlap against document
/// term counts, so results are reproducible in tests and offline runs.
#[derive(Default)]
pub struct MemoryRetriever {
    docs: RwLock<BTreeMap<String, String>>,
}

impl MemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document under `source`
    pub async fn ingest(&self, source: &str, text: &str) {
        self.docs
            .write()
            .await
            .insert(source.to_string(), text.to_string());
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    fn terms(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2)
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl Retriever for MemoryRetriever {
    async fn query(&self, text: &str, top_k: usize) -> anyhow::Result<Vec<Chunk>> {
        let query_terms = Self::terms(text);
        let docs = self.docs.read().await;

        let mut scored: Vec<Chunk> = docs
            .iter()
            .filter_map(|(source, body)| {
                let doc_terms = Self::terms(body);
                if doc_terms.is_empty() {
                    return None;
                }
                let hits = query_terms
                    .iter()
                    .filter(|t| doc_terms.contains(*t))
                    .count();
                if hits == 0 {
                    return None;
                }
                Some(Chunk {
                    text: body.clone(),
                    score: hits as f64 / doc_terms.len() as f64,
                    source: source.clone(),
                })
            })
            .collect();

        // Ties broken by source name so ranking is stable
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source.cmp(&b.source))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Assembles system and user prompt text for one agent invocation
#[derive(Debug, Clone)]
pub struct ContextManager {
    rag_top_k: usize,
    rag_char_budget: usize,
}

impl ContextManager {
    pub fn new(rag_top_k: usize, rag_char_budget: usize) -> Self {
        Self {
            rag_top_k,
            rag_char_budget,
        }
    }

    /// Fixed instructions for an agent: role prompt, Golden Rules, and the
    /// output contract reminder
    pub fn system_prompt(&self, spec: &AgentSpec) -> String {
        format!(
            "{}\n\n{}\nYour output must be a JSON object valid against the '{}' schema.\n",
            spec.system_prompt.trim_end(),
            prompts::GOLDEN_RULES.trim_end(),
            spec.schema_name
        )
    }

    /// Build the user-side context in the fixed composition order
    pub async fn build_user(
        &self,
        request: &str,
        prior_outputs: &[(String, serde_json::Value)],
        retriever: Option<&dyn Retriever>,
        structure_summary: Option<&str>,
    ) -> String {
        let mut out = String::new();
        out.push_str("## Request\n\n");
        out.push_str(request.trim());
        out.push('\n');

        if !prior_outputs.is_empty() {
            out.push_str("\n## Upstream artifacts\n");
            for (label, value) in prior_outputs {
                let rendered = serde_json::to_string_pretty(value)
                    .unwrap_or_else(|_| "<unrenderable artifact>".to_string());
                out.push_str(&format!("\n### {}\n```json\n{}\n```\n", label, rendered));
            }
        }

        if let Some(retriever) = retriever {
            match retriever.query(request, self.rag_top_k).await {
                Ok(chunks) if !chunks.is_empty() => {
                    let injected = self.render_chunks(&chunks);
                    if !injected.is_empty() {
                        out.push_str("\n## Retrieved context\n\n");
                        out.push_str(&injected);
                        out.push('\n');
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    // Retrieval is optional context; its failure never
                    // blocks the invocation
                    tracing::warn!("retrieval failed, continuing without context: {}", e);
                }
            }
        }

        if let Some(summary) = structure_summary {
            out.push_str("\n## Project structure\n\n");
            out.push_str(summary.trim());
            out.push('\n');
        }

        out
    }

    /// Join chunks verbatim with a separator, then truncate the whole block
    /// to the character budget. Over-budget context is cut, never dropped.
    fn render_chunks(&self, chunks: &[Chunk]) -> String {
        let joined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR);

        if joined.chars().count() <= self.rag_char_budget {
            joined
        } else {
            joined.chars().take(self.rag_char_budget).collect()
        }
    }
}
