//! Deterministic query variants for the multi-strategy vector search

use crate::conversation::ConversationStore;
use crate::graph_context::GraphContext;
use serde::Serialize;
use std::fmt;

const ENHANCED_ENTITIES: usize = 3;
const FOCUS_ENTITIES: usize = 5;
const FOCUS_KEYWORDS: usize = 3;

/// Where a variant's text came from. Declaration order is fusion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Original,
    Summary,
    FollowUp,
    GraphEnhanced,
    EntityFocused,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Original => "original",
            VariantKind::Summary => "summary",
            VariantKind::FollowUp => "follow_up",
            VariantKind::GraphEnhanced => "graph_enhanced",
            VariantKind::EntityFocused => "entity_focused",
        }
    }

    /// Chunks requested per store for this kind of variant
    pub fn top_k(&self) -> usize {
        match self {
            VariantKind::Original | VariantKind::Summary => 3,
            VariantKind::FollowUp | VariantKind::GraphEnhanced | VariantKind::EntityFocused => 2,
        }
    }

    /// Whether the variant needs graph results before it can be built
    pub fn is_graph_guided(&self) -> bool {
        matches!(self, VariantKind::GraphEnhanced | VariantKind::EntityFocused)
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One vector-store query derived from the user's question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryVariant {
    pub text: String,
    pub kind: VariantKind,
    pub top_k: usize,
}

impl QueryVariant {
    pub fn new(kind: VariantKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            top_k: kind.top_k(),
        }
    }
}

pub struct QueryVariantBuilder;

impl QueryVariantBuilder {
    /// Variants that depend only on the query and the conversation:
    /// original, then summary and follow-up when history allows.
    pub fn conversational(query: &str, conversation: &ConversationStore) -> Vec<QueryVariant> {
        let mut variants = vec![QueryVariant::new(VariantKind::Original, query)];

        if let Some(summary) = conversation.build_summary_query(query) {
            variants.push(QueryVariant::new(VariantKind::Summary, summary));
        }
        if let Some(follow_up) = conversation.build_follow_up_query(query) {
            variants.push(QueryVariant::new(VariantKind::FollowUp, follow_up));
        }

        variants
    }

    /// Variants built from graph context: graph-enhanced and entity-focused
    pub fn graph_guided(query: &str, context: &GraphContext) -> Vec<QueryVariant> {
        let mut variants = Vec::new();

        if !context.entities.is_empty() {
            let top: Vec<&str> = context
                .entities
                .iter()
                .take(ENHANCED_ENTITIES)
                .map(String::as_str)
                .collect();
            variants.push(QueryVariant::new(
                VariantKind::GraphEnhanced,
                format!("{} {}", query, top.join(" ")),
            ));
        }

        let focus: Vec<&str> = context
            .entities
            .iter()
            .take(FOCUS_ENTITIES)
            .chain(context.keywords.iter().take(FOCUS_KEYWORDS))
            .map(String::as_str)
            .collect();
        if !focus.is_empty() {
            variants.push(QueryVariant::new(VariantKind::EntityFocused, focus.join(" ")));
        }

        variants
    }

    /// All applicable variants in fixed order
    pub fn build(
        query: &str,
        conversation: &ConversationStore,
        context: &GraphContext,
    ) -> Vec<QueryVariant> {
        let mut variants = Self::conversational(query, conversation);
        variants.extend(Self::graph_guided(query, context));
        variants
    }
}
