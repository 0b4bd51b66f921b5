//! Per-session conversation history and the query signals derived from it

use crate::text::{char_len, truncate_chars};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Exchanges inspected for key-term enrichment
const CONTEXT_WINDOW: usize = 2;

/// Exchanges rendered into the synthesis prompt
const PROMPT_WINDOW: usize = 3;

const MAX_KEY_TERMS: usize = 5;
const KEY_TERM_ANSWER_CHARS: usize = 300;

const SUMMARY_QUESTION_CHARS: usize = 80;
const SUMMARY_ANSWER_CHARS: usize = 150;
const SUMMARY_MIN_SENTENCE_CHARS: usize = 50;

const FOLLOW_UP_QUESTION_CHARS: usize = 100;
const FOLLOW_UP_CONNECTOR: &str = " về ";

const PROMPT_QUESTION_CHARS: usize = 150;
const PROMPT_ANSWER_CHARS: usize = 300;

/// Phrases marking a query as a follow-up to the previous exchange
const FOLLOW_UP_MARKERS: &[&str] = &[
    "tell me more",
    "explain",
    "what about",
    "how about",
    "chi tiết",
    "giải thích",
    "cụ thể",
    "thêm về",
    "còn gì",
    "ngoài ra",
    "ví dụ",
    "example",
    "more detail",
    "elaborate",
];

/// One completed question/answer turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// Strategy for pulling salient terms out of recent exchanges
pub trait KeyTermExtractor: Send + Sync {
    /// Terms to append to a new query, most important first
    fn extract(&self, recent: &[Exchange]) -> Vec<String>;
}

/// Capitalisation and length heuristic.
///
/// A token qualifies when it is longer than 3 characters and either contains
/// an uppercase character or is longer than 6 characters. The longest five
/// distinct tokens win, ties keeping encounter order.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    fn qualifies(token: &str) -> bool {
        let len = char_len(token);
        len > 3 && (token.chars().any(char::is_uppercase) || len > 6)
    }
}

impl KeyTermExtractor for HeuristicExtractor {
    fn extract(&self, recent: &[Exchange]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut terms: Vec<&str> = Vec::new();

        for exchange in recent {
            let answer = truncate_chars(&exchange.answer, KEY_TERM_ANSWER_CHARS);
            for text in [exchange.question.as_str(), answer] {
                for token in split_tokens(text) {
                    if Self::qualifies(token) && seen.insert(token) {
                        terms.push(token);
                    }
                }
            }
        }

        // stable: equal lengths keep encounter order
        terms.sort_by_key(|t| std::cmp::Reverse(char_len(t)));
        terms
            .into_iter()
            .take(MAX_KEY_TERMS)
            .map(str::to_string)
            .collect()
    }
}

fn split_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c == '.' || c == ':' || c.is_whitespace())
        .filter(|t| !t.is_empty())
}

/// Ordered history of one session's exchanges
#[derive(Clone)]
pub struct ConversationStore {
    exchanges: Vec<Exchange>,
    extractor: Arc<dyn KeyTermExtractor>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationStore")
            .field("exchanges", &self.exchanges.len())
            .finish()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::with_extractor(Arc::new(HeuristicExtractor))
    }

    /// Use a custom key-term strategy for contextual queries
    pub fn with_extractor(extractor: Arc<dyn KeyTermExtractor>) -> Self {
        Self {
            exchanges: Vec::new(),
            extractor,
        }
    }

    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.exchanges.push(Exchange {
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// The last `n` exchanges, oldest first
    pub fn recent(&self, n: usize) -> &[Exchange] {
        &self.exchanges[self.exchanges.len().saturating_sub(n)..]
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Query enriched with key terms from the last two exchanges
    pub fn derive_contextual_query(&self, query: &str) -> String {
        if self.is_empty() {
            return query.to_string();
        }

        let terms = self.extractor.extract(self.recent(CONTEXT_WINDOW));
        if terms.is_empty() {
            return query.to_string();
        }

        format!("{} {}", query, terms.join(" "))
    }

    /// Natural-language restatement of the last exchange followed by the query
    pub fn build_summary_query(&self, query: &str) -> Option<String> {
        let last = self.exchanges.last()?;

        let mut answer_summary = truncate_chars(&last.answer, SUMMARY_ANSWER_CHARS).trim();
        if char_len(&last.answer) > SUMMARY_ANSWER_CHARS {
            if let Some(period) = answer_summary.rfind('.') {
                if char_len(&answer_summary[..period]) > SUMMARY_MIN_SENTENCE_CHARS {
                    answer_summary = &answer_summary[..=period];
                }
            }
        }

        Some(format!(
            "Context: {} - {} | Question: {}",
            truncate_chars(&last.question, SUMMARY_QUESTION_CHARS),
            answer_summary,
            query
        ))
    }

    /// Query tied to the previous question, when it reads as a follow-up
    pub fn build_follow_up_query(&self, query: &str) -> Option<String> {
        let last = self.exchanges.last()?;

        let lowered = query.to_lowercase();
        if !FOLLOW_UP_MARKERS.iter().any(|m| lowered.contains(m)) {
            return None;
        }

        Some(format!(
            "{}{}{}",
            query,
            FOLLOW_UP_CONNECTOR,
            truncate_chars(&last.question, FOLLOW_UP_QUESTION_CHARS)
        ))
    }

    /// Recent turns formatted for the synthesis prompt; empty without history
    pub fn prompt_context(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut lines = vec!["Previous conversation:".to_string()];
        for exchange in self.recent(PROMPT_WINDOW) {
            lines.push(format!(
                "User: {}",
                truncate_chars(&exchange.question, PROMPT_QUESTION_CHARS)
            ));
            lines.push(format!(
                "Assistant: {}",
                truncate_chars(&exchange.answer, PROMPT_ANSWER_CHARS)
            ));
            lines.push(String::new());
        }
        lines.join("\n")
    }
}
