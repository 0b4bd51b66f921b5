//! Knowledge graph similarity search over the Neo4j HTTP API
//!
//! Query text is embedded with the configured [`Embedder`], then a Cypher
//! statement computes cosine similarity against every node carrying an
//! `embedding` property and collects each hit's first-degree relationships.

use super::GraphSearch;
use async_trait::async_trait;
use graphrag_common::config::GraphConfig;
use graphrag_common::embeddings::Embedder;
use graphrag_common::errors::{AppError, Result};
use graphrag_common::models::{Direction, GraphHit, GraphRelationship, SIMILARITY_FLOOR};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const VECTOR_SEARCH_CYPHER: &str = r#"
MATCH (n)
WHERE n.embedding IS NOT NULL AND size(n.embedding) = size($query_embedding)
WITH n,
     reduce(dot = 0.0, i IN range(0, size(n.embedding)-1) |
         dot + n.embedding[i] * $query_embedding[i]) AS dotProduct,
     sqrt(reduce(sum = 0.0, i IN range(0, size(n.embedding)-1) |
         sum + n.embedding[i] * n.embedding[i])) AS norm1,
     sqrt(reduce(sum = 0.0, i IN range(0, size($query_embedding)-1) |
         sum + $query_embedding[i] * $query_embedding[i])) AS norm2
WITH n, dotProduct / (norm1 * norm2) AS score
WHERE score > $min_score
ORDER BY score DESC
LIMIT $top_k
OPTIONAL MATCH (n)-[r]-(connected)
RETURN
    n.id AS node_id,
    n.text AS text,
    labels(n) AS labels,
    score,
    collect(DISTINCT {
        relationship: type(r),
        direction: CASE WHEN startNode(r) = n THEN 'outgoing' ELSE 'incoming' END,
        connected_node: connected.id,
        connected_text: connected.text,
        connected_labels: labels(connected)
    }) AS relationships
ORDER BY score DESC
"#;

/// Neo4j transaction endpoint response
#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// One result row, before validation
#[derive(Debug, Default, Deserialize)]
struct RawHit {
    node_id: Option<String>,
    text: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    score: Option<f64>,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRelationship {
    relationship: Option<String>,
    direction: Option<String>,
    connected_node: Option<String>,
    connected_text: Option<String>,
    connected_labels: Option<Vec<String>>,
}

impl RawRelationship {
    fn validate(self) -> Option<GraphRelationship> {
        let rel_type = self.relationship.filter(|t| !t.is_empty())?;
        let direction = match self.direction.as_deref() {
            Some("incoming") => Direction::Incoming,
            _ => Direction::Outgoing,
        };

        Some(GraphRelationship {
            rel_type,
            direction,
            connected_id: self.connected_node.unwrap_or_default(),
            connected_text: self.connected_text,
            connected_labels: self.connected_labels.unwrap_or_default(),
        })
    }
}

impl RawHit {
    fn validate(self) -> Option<GraphHit> {
        let node_id = self.node_id.filter(|id| !id.is_empty())?;
        let score = self.score.filter(|s| *s > SIMILARITY_FLOOR)?;

        Some(GraphHit {
            node_id,
            text: self.text.unwrap_or_default(),
            labels: self.labels,
            score,
            relationships: self
                .relationships
                .into_iter()
                .filter_map(RawRelationship::validate)
                .collect(),
        })
    }
}

/// Graph search backed by Neo4j's HTTP transaction endpoint
pub struct Neo4jGraphSearch {
    client: reqwest::Client,
    endpoint: String,
    user: String,
    password: String,
    embedder: Arc<dyn Embedder>,
}

impl Neo4jGraphSearch {
    /// Create a new graph search client
    pub fn new(config: &GraphConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/db/{}/tx/commit",
                config.url.trim_end_matches('/'),
                config.database
            ),
            user: config.user.clone(),
            password: config.password.clone(),
            embedder,
        })
    }

    async fn run_statement(&self, parameters: Value) -> Result<TxResult> {
        let body = json!({
            "statements": [{
                "statement": VECTOR_SEARCH_CYPHER,
                "parameters": parameters,
            }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::GraphSearch {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GraphSearch {
                message: format!("Neo4j error {}: {}", status, body),
            });
        }

        let parsed: TxResponse = response.json().await.map_err(|e| AppError::GraphSearch {
            message: format!("Failed to parse response: {}", e),
        })?;

        if let Some(err) = parsed.errors.into_iter().next() {
            return Err(AppError::GraphSearch {
                message: format!("{}: {}", err.code, err.message),
            });
        }

        parsed.results.into_iter().next().ok_or_else(|| AppError::GraphSearch {
            message: "Empty result set".to_string(),
        })
    }
}

/// Turn tabular rows into validated hits, best first
fn collect_hits(result: TxResult, top_k: usize) -> Vec<GraphHit> {
    let mut hits: Vec<GraphHit> = result
        .data
        .into_iter()
        .filter_map(|row| {
            let record: Map<String, Value> =
                result.columns.iter().cloned().zip(row.row).collect();
            match serde_json::from_value::<RawHit>(Value::Object(record)) {
                Ok(raw) => raw.validate(),
                Err(e) => {
                    warn!(error = %e, "Dropping malformed graph row");
                    None
                }
            }
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(top_k);
    hits
}

#[async_trait]
impl GraphSearch for Neo4jGraphSearch {
    async fn vector_search(&self, query: &str, top_k: usize) -> Result<Vec<GraphHit>> {
        let embedding = self.embedder.embed(query).await?;

        let result = self
            .run_statement(json!({
                "query_embedding": embedding,
                "top_k": top_k,
                "min_score": SIMILARITY_FLOOR,
            }))
            .await?;

        let hits = collect_hits(result, top_k);
        debug!(hits = hits.len(), top_k, "Graph vector search completed");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrag_common::embeddings::MockEmbedder;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(node_id: &str, score: f64, relationships: Value) -> Value {
        json!({
            "row": [node_id, format!("{} text", node_id), ["Place"], score, relationships],
            "meta": []
        })
    }

    fn tx_body(rows: Vec<Value>) -> Value {
        json!({
            "results": [{
                "columns": ["node_id", "text", "labels", "score", "relationships"],
                "data": rows
            }],
            "errors": []
        })
    }

    async fn search_against(server: &MockServer) -> Neo4jGraphSearch {
        let config = GraphConfig {
            url: server.uri(),
            password: "secret".to_string(),
            timeout_secs: 5,
            ..GraphConfig::default()
        };
        Neo4jGraphSearch::new(&config, Arc::new(MockEmbedder::new(8))).unwrap()
    }

    #[tokio::test]
    async fn test_hits_are_validated_and_ordered() {
        let server = MockServer::start().await;
        let empty_rel = json!([{
            "relationship": null, "direction": "incoming",
            "connected_node": null, "connected_text": null, "connected_labels": null
        }]);
        let rels = json!([{
            "relationship": "LOCATED_IN", "direction": "outgoing",
            "connected_node": "Vietnam", "connected_text": "A country",
            "connected_labels": ["Country"]
        }]);

        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tx_body(vec![
                row("Hue", 0.55, empty_rel.clone()),
                row("Hanoi", 0.92, rels),
                row("Noise", 0.30, empty_rel.clone()),
                row("Saigon", 0.71, empty_rel),
            ])))
            .mount(&server)
            .await;

        let search = search_against(&server).await;
        let hits = search.vector_search("capital of Vietnam", 5).await.unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.node_id.as_str()).collect();
        assert_eq!(ids, vec!["Hanoi", "Saigon", "Hue"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(hits.iter().all(|h| h.score > SIMILARITY_FLOOR));

        assert_eq!(hits[0].relationships.len(), 1);
        assert_eq!(hits[0].relationships[0].connected_id, "Vietnam");
        assert!(hits[1].relationships.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_is_respected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tx_body(vec![
                row("a", 0.9, json!([])),
                row("b", 0.8, json!([])),
                row("c", 0.7, json!([])),
            ])))
            .mount(&server)
            .await;

        let search = search_against(&server).await;
        assert_eq!(search.vector_search("q", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cypher_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [],
                "errors": [{ "code": "Neo.ClientError.Statement.SyntaxError", "message": "bad" }]
            })))
            .mount(&server)
            .await;

        let search = search_against(&server).await;
        let err = search.vector_search("q", 5).await.unwrap_err();
        assert!(matches!(err, AppError::GraphSearch { .. }));
    }

    #[tokio::test]
    async fn test_http_failure_is_graph_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let search = search_against(&server).await;
        assert!(matches!(
            search.vector_search("q", 5).await,
            Err(AppError::GraphSearch { .. })
        ));
    }

    #[test]
    fn test_rows_missing_node_id_are_dropped() {
        let result = TxResult {
            columns: vec!["node_id".into(), "score".into()],
            data: vec![
                TxRow { row: vec![Value::Null, json!(0.9)] },
                TxRow { row: vec![json!("kept"), json!(0.8)] },
            ],
        };
        let hits = collect_hits(result, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node_id, "kept");
        assert!(hits[0].text.is_empty());
    }
}
