//! Knowledge graph search hits

use serde::{Deserialize, Serialize};

/// Graph hits at or below this cosine similarity are never returned
pub const SIMILARITY_FLOOR: f64 = 0.3;

/// Relationships rendered into a hit's evidence block
const MAX_RENDERED_RELATIONSHIPS: usize = 5;

/// Direction of a relationship relative to the hit node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    fn arrow(self) -> &'static str {
        match self {
            Direction::Outgoing => "->",
            Direction::Incoming => "<-",
        }
    }
}

/// First-degree relationship of a graph hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphRelationship {
    /// Relationship type, e.g. `LOCATED_IN`
    pub rel_type: String,

    pub direction: Direction,

    /// `id` property of the node on the other end
    pub connected_id: String,

    pub connected_text: Option<String>,

    #[serde(default)]
    pub connected_labels: Vec<String>,
}

/// Scored node returned by similarity search over the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphHit {
    pub node_id: String,

    /// Raw `text` property of the node
    pub text: String,

    pub labels: Vec<String>,

    /// Cosine similarity, always above [`SIMILARITY_FLOOR`]
    pub score: f64,

    pub relationships: Vec<GraphRelationship>,
}

impl GraphHit {
    /// Whether the node carries any text; whitespace counts
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }

    /// Node text followed by its relationships, one per line.
    ///
    /// ```text
    /// Node (City, Capital): Hanoi is the capital of Vietnam.
    ///   -> LOCATED_IN: Vietnam is a country in Southeast Asia.
    /// ```
    pub fn rendered(&self) -> String {
        let mut lines = vec![format!("Node ({}): {}", self.labels.join(", "), self.text)];

        for rel in self
            .relationships
            .iter()
            .filter(|r| !r.rel_type.is_empty())
            .take(MAX_RENDERED_RELATIONSHIPS)
        {
            lines.push(format!(
                "  {} {}: {}",
                rel.direction.arrow(),
                rel.rel_type,
                rel.connected_text.as_deref().unwrap_or_default()
            ));
        }

        lines.join("\n")
    }
}
