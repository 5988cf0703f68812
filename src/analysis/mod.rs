//! Analysis modules.
//!
//! Loading, per-post categorization, aggregation and corpus summarization.
//! Orchestration lives in the pipeline.

pub mod aggregator;
pub mod categorizer;
pub mod content;
pub mod loader;
pub mod summarizer;

pub use aggregator::aggregate;
pub use categorizer::{Categorizer, CategorizerConfig};
pub use loader::{load_window, LoadOutcome};
pub use summarizer::{Summarizer, SummarizerConfig};
