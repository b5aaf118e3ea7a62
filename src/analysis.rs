//! Analysis backend boundary
//!
//! Wire types, the backend transport contract, the HTTP adapter, staged
//! payload parsing and bounded retries.

mod backend;
mod http;
pub mod parser;
pub mod retry;
mod types;

pub use backend::{AnalysisBackend, BackendError, FailureCode, FailureResponse};
pub use http::HttpBackend;
pub use parser::{ParseStage, ParsedAnalysis, failure_in_payload, parse_analysis};
pub use retry::{RetryPolicy, call_with_retry};
pub use types::{
    AnalysisOptions, AnalysisRequest, AnalysisResult, ReadabilityMetrics, RequestId, Severity,
    Suggestion, SuggestionKind, TextRange,
};

#[cfg(test)]
#[path = "analysis_tests.rs"]
mod analysis_tests;
