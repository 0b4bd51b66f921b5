//! Evidence fusion
//!
//! Graph evidence first, then vector chunks in variant order. Items are
//! deduplicated on their first 100 characters; the earliest instance wins.

use crate::retriever::VariantResult;
use crate::text::truncate_chars;
use graphrag_common::models::GraphHit;
use serde::Serialize;
use std::collections::HashSet;

/// Characters of content compared for duplicate detection
pub const DEDUP_KEY_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceOrigin {
    Graph,
    Vector,
}

/// One candidate passage for ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceItem {
    pub content: String,
    pub origin: EvidenceOrigin,
}

impl EvidenceItem {
    pub fn dedup_key(&self) -> &str {
        truncate_chars(&self.content, DEDUP_KEY_CHARS)
    }
}

/// Evidence block for a graph hit
pub fn graph_evidence(hit: &GraphHit) -> String {
    format!(
        "Graph Knowledge (Node ID: {}, Labels: {}, Score: {:.3}):\n{}",
        hit.node_id,
        hit.labels.join(", "),
        hit.score,
        hit.rendered()
    )
}

pub struct EvidenceFuser;

impl EvidenceFuser {
    pub fn fuse(hits: &[GraphHit], results: &[VariantResult]) -> Vec<EvidenceItem> {
        let mut ordered: Vec<&VariantResult> = results.iter().collect();
        ordered.sort_by_key(|r| r.variant.kind);

        let graph = hits
            .iter()
            .filter(|hit| hit.has_text())
            .map(|hit| EvidenceItem {
                content: graph_evidence(hit),
                origin: EvidenceOrigin::Graph,
            });

        let vector = ordered
            .into_iter()
            .flat_map(|r| r.documents.iter())
            .map(|doc| EvidenceItem {
                content: doc.clone(),
                origin: EvidenceOrigin::Vector,
            });

        let mut seen = HashSet::new();
        graph
            .chain(vector)
            .filter(|item| seen.insert(item.dedup_key().to_string()))
            .collect()
    }
}
