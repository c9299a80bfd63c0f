//! Calls to the external inference oracle.
//!
//! `LlmClient` is the transport seam; `AnalysisService` and `TrendService`
//! sit on top of it and never fail: any `OracleError` is logged and replaced
//! by a fixed safe result before it reaches the orchestrator.

pub mod analysis;
pub mod client;
pub mod parser;
pub mod prompt;
pub mod trend;

pub use analysis::*;
pub use client::*;
pub use parser::*;
pub use prompt::*;
pub use trend::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Inference service is not reachable at {0}")]
    Connection(String),

    #[error("Inference service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("Oracle response is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
}
