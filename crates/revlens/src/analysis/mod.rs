//! Change analysis with a local generative model.
//!
//! - [`sanitize`] - escaping and injection filtering for untrusted text
//! - [`prompts`] - fixed prompt templates
//! - [`client`] - `GenerativeClient` and the `Generator` trait
//! - [`extract`] - JSON extraction and keyword fallback categorization
//! - [`analyzer`] - `Analyzer`, one method per analysis task
//! - [`pipeline`] - `AnalysisPipeline`, batch runs over the store

pub mod analyzer;
pub mod client;
pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod sanitize;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::{AnalysisError, Analyzer, AnalyzerOptions, ChangeAnalysis, DEFAULT_BASE_TIMEOUT};
pub use client::{DEFAULT_MODEL, DEFAULT_MODEL_URL, GenerateError, GenerativeClient, Generator};
pub use extract::{
    Categorization, CategorySource, categorize_by_keywords, extract_json_object,
    parse_categorization,
};
pub use pipeline::{AnalysisPipeline, DEFAULT_ANALYSIS_LIMIT, PipelineError, PipelineReport};
pub use sanitize::sanitize;
