//! proseline library - anchored writing suggestions for live documents
//!
//! Analysis results arrive asynchronously and may be stale by the time they
//! land. This library schedules analyses, caches and meters them, and maps
//! every suggestion back onto the document text as it currently stands.

pub mod analysis;
pub mod anchor;
pub mod cache;
pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod hasher;
pub mod lifecycle;
mod lock;
pub mod quota;
pub mod report;
pub mod scheduler;
pub mod store;

// Re-export commonly used types for convenience
pub use analysis::{AnalysisResult, Suggestion, SuggestionKind, TextRange};
pub use anchor::{AnchorResolver, AnchorResult};
pub use config::Config;
pub use document::{DocumentModel, RichTextDocument};
pub use error::{AnalysisError, ValidationError};
pub use lifecycle::{SuggestionManager, SuggestionState};
pub use scheduler::{AnalysisEvent, AnalysisScheduler, AnalysisServices, SchedulerState};
