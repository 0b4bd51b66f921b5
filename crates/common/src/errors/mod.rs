//! Error types for GraphRAG services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for each external collaborator
//! - A failure class used by the pipeline to decide between degrading and aborting
//! - HTTP status code mapping
//! - Structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Resource errors (4xxx)
    NotFound,
    SessionNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    UpstreamError,
    GraphSearchError,
    VectorStoreError,
    RerankerError,
    EmbeddingError,
    EmbeddingTimeout,
    UpstreamTimeout,
    LlmError,

    // Configuration errors (85xx)
    NoDocumentStore,
    LlmNotConfigured,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::NotFound => 4001,
            ErrorCode::SessionNotFound => 4005,

            ErrorCode::RateLimited => 6001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::GraphSearchError => 8002,
            ErrorCode::VectorStoreError => 8003,
            ErrorCode::RerankerError => 8004,
            ErrorCode::EmbeddingError => 8005,
            ErrorCode::EmbeddingTimeout => 8006,
            ErrorCode::UpstreamTimeout => 8007,
            ErrorCode::LlmError => 8008,

            ErrorCode::NoDocumentStore => 8501,
            ErrorCode::LlmNotConfigured => 8502,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// How the query pipeline treats a failure.
///
/// External-service failures narrow the evidence set, configuration failures
/// switch to a fallback path, and only synthesis failures reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    ExternalService,
    Configuration,
    Synthesis,
    Request,
    Internal,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // External service errors
    #[error("Graph search error: {message}")]
    GraphSearch { message: String },

    #[error("Vector store error: {message}")]
    VectorStore { message: String },

    #[error("Reranker error: {message}")]
    Reranker { message: String },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Embedding timeout after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("{service} call timed out after {timeout_ms}ms")]
    Timeout { service: String, timeout_ms: u64 },

    #[error("Language model error: {message}")]
    Llm { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Configuration-driven fallbacks
    #[error("No document store selected and no default store configured")]
    NoDocumentStore,

    #[error("No language model credential configured")]
    LlmNotConfigured,

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::GraphSearch { .. } => ErrorCode::GraphSearchError,
            AppError::VectorStore { .. } => ErrorCode::VectorStoreError,
            AppError::Reranker { .. } => ErrorCode::RerankerError,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::EmbeddingTimeout { .. } => ErrorCode::EmbeddingTimeout,
            AppError::Timeout { .. } => ErrorCode::UpstreamTimeout,
            AppError::Llm { .. } => ErrorCode::LlmError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::NoDocumentStore => ErrorCode::NoDocumentStore,
            AppError::LlmNotConfigured => ErrorCode::LlmNotConfigured,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Classify this error for the query pipeline
    pub fn class(&self) -> FailureClass {
        match self {
            AppError::GraphSearch { .. }
            | AppError::VectorStore { .. }
            | AppError::Reranker { .. }
            | AppError::EmbeddingError { .. }
            | AppError::EmbeddingTimeout { .. }
            | AppError::Timeout { .. }
            | AppError::HttpClient(_) => FailureClass::ExternalService,

            AppError::NoDocumentStore
            | AppError::LlmNotConfigured
            | AppError::Configuration { .. } => FailureClass::Configuration,

            AppError::Llm { .. } => FailureClass::Synthesis,

            AppError::Validation { .. }
            | AppError::NotFound { .. }
            | AppError::SessionNotFound { .. }
            | AppError::RateLimited { .. } => FailureClass::Request,

            AppError::Internal { .. }
            | AppError::Serialization(_)
            | AppError::ServiceUnavailable { .. }
            | AppError::Other(_) => FailureClass::Internal,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } | AppError::SessionNotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::NoDocumentStore
            | AppError::LlmNotConfigured
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::GraphSearch { .. }
            | AppError::VectorStore { .. }
            | AppError::Reranker { .. }
            | AppError::EmbeddingError { .. }
            | AppError::Llm { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::EmbeddingTimeout { .. } | AppError::Timeout { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }

            // 503 Service Unavailable
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
