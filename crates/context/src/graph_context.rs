//! Entities, keywords and a short summary distilled from graph hits

use crate::text::{char_len, truncate_chars};
use graphrag_common::models::GraphHit;
use serde::Serialize;
use std::collections::HashSet;

const MAX_ENTITIES: usize = 10;
const MAX_KEYWORDS: usize = 15;
const MAX_SUMMARY_PARTS: usize = 5;
const HIT_TEXT_CHARS: usize = 200;
const CONNECTED_TEXT_CHARS: usize = 100;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "to", "of", "and", "or", "in",
    "on", "at", "for", "with",
];

/// Query-enrichment signals derived from one batch of graph hits
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphContext {
    /// Node ids of hits and their neighbours, encounter order
    pub entities: Vec<String>,

    /// Distinct terms, original casing, encounter order
    pub keywords: Vec<String>,

    pub summary: String,
}

/// Insertion-ordered set with a caller-chosen identity
struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    fn insert_keyed(&mut self, key: String, value: &str) {
        if self.seen.insert(key) {
            self.items.push(value.to_string());
        }
    }
}

fn id_tokens(id: &str) -> impl Iterator<Item = &str> {
    id.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|t| !t.is_empty())
}

impl GraphContext {
    /// Extract entities, keywords and summary from `hits`
    pub fn extract(hits: &[GraphHit]) -> Self {
        let mut entities = OrderedSet::new();
        let mut candidates: Vec<String> = Vec::new();
        let mut parts: Vec<&str> = Vec::new();

        for hit in hits {
            if !hit.node_id.is_empty() {
                entities.insert_keyed(hit.node_id.clone(), &hit.node_id);
                candidates.extend(id_tokens(&hit.node_id).map(str::to_string));
            }

            candidates.extend(hit.labels.iter().cloned());

            if hit.has_text() {
                parts.push(truncate_chars(&hit.text, HIT_TEXT_CHARS));
            }

            for rel in &hit.relationships {
                if !rel.rel_type.is_empty() {
                    candidates.push(rel.rel_type.replace('_', " "));
                }

                if !rel.connected_id.is_empty() {
                    entities.insert_keyed(rel.connected_id.clone(), &rel.connected_id);
                    candidates.extend(id_tokens(&rel.connected_id).map(str::to_string));
                }

                if let Some(text) = rel.connected_text.as_deref().filter(|t| !t.trim().is_empty()) {
                    parts.push(truncate_chars(text, CONNECTED_TEXT_CHARS));
                }
            }
        }

        let mut keywords = OrderedSet::new();
        for candidate in &candidates {
            let lowered = candidate.to_lowercase();
            if char_len(candidate) > 2 && !STOP_WORDS.contains(&lowered.as_str()) {
                keywords.insert_keyed(lowered, candidate);
            }
        }

        let mut entities = entities.items;
        entities.truncate(MAX_ENTITIES);
        let mut keywords = keywords.items;
        keywords.truncate(MAX_KEYWORDS);

        let summary = parts
            .into_iter()
            .take(MAX_SUMMARY_PARTS)
            .collect::<Vec<_>>()
            .join(" | ");

        Self {
            entities,
            keywords,
            summary,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.keywords.is_empty()
    }
}
