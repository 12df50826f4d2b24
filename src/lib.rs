//! # RagFold
//!
//! **RagFold** evaluates whether a RAG-backed LLM classifier correctly accepts or
//! rejects adversarial prompts, under cross-validated train/test splits.
//!
//! The retrieval corpus for each fold is built from *mutated* variants of adversarial
//! base prompts, while the base prompts themselves are held out for testing — so the
//! classifier is never shown the exact text it is later judged on (no leakage).
//!
//! ## Core Architecture
//!
//! The library is built around five main parts:
//!
//! 1.  **[CrossValidation](crate::fold::CrossValidation)**: the fold partitioner; a pure function deciding, per fold, whether an item trains or tests.
//! 2.  **[MutationCorpus](crate::corpus::MutationCorpus)** / **[TestRow](crate::corpus::TestRow)**: the data model; mutated prompts with their owning base prompts, and the rows under evaluation.
//! 3.  **[DocumentIndex](crate::rag::DocumentIndex)** / **[Generator](crate::rag::Generator)**: the external RAG seams; retrieve top-k similar documents, then generate an answer conditioned on them.
//! 4.  **[normalize](crate::normalizer::normalize)**: maps raw model output to a binary [`Verdict`], escalating ambiguous output to a human [Arbiter](crate::normalizer::Arbiter).
//! 5.  **[Harness](crate::runner::Harness)**: the sequential engine that drives folds, accumulates the tally, and persists per-item results incrementally.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ragfold::corpus::{load_test_rows, MutationCorpus};
//! use ragfold::fold::CrossValidation;
//! use ragfold::normalizer::StdinArbiter;
//! use ragfold::rag::{ChatGenerator, EmbeddingIndexFactory, DEFAULT_TOP_K};
//! use ragfold::report::JsonArrayWriter;
//! use ragfold::runner::{Harness, Pipeline};
//! use std::collections::HashSet;
//! use std::fs::File;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Load the mutation corpus (training material) and the rows under test
//!     let ignore: HashSet<String> = HashSet::new();
//!     let corpus = MutationCorpus::load(Path::new("prompts_with_mutations.json"), &ignore)?;
//!     let rows = load_test_rows(Path::new("benchmark.csv"), "Prompts")?;
//!     let system_prompt = std::fs::read_to_string("prompt.md")?;
//!
//!     // 2. Wire up the external services (any OpenAI-compatible endpoint, e.g. Ollama)
//!     let base = "http://localhost:11434/v1".to_string();
//!     let factory = EmbeddingIndexFactory::new_with_base_url(
//!         String::new(), "nomic-embed-text".to_string(), base.clone());
//!     let generator = ChatGenerator::new_with_base_url(
//!         String::new(), "gemma3".to_string(), system_prompt, base);
//!     let arbiter = StdinArbiter;
//!
//!     // 3. Run all folds sequentially, appending each result as it completes
//!     let harness = Harness::new(CrossValidation::SimpleFifths, DEFAULT_TOP_K);
//!     let mut sink = JsonArrayWriter::new(File::create("results.json")?)?;
//!     let pipeline = Pipeline {
//!         index_factory: &factory,
//!         generator: &generator,
//!         arbiter: &arbiter,
//!     };
//!     let summary = harness.run(&corpus, &rows, &ignore, &pipeline, &mut sink).await?;
//!     sink.finish()?;
//!
//!     println!("{}", summary.tally);
//!     Ok(())
//! }
//! ```

pub mod corpus;
pub mod fold;
pub mod normalizer;
pub mod rag;
pub mod report;
pub mod runner;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A convenient type alias for `anyhow::Result`.
pub type RagFoldResult<T> = anyhow::Result<T>;

/// The final binary decision for one test item.
///
/// Serialized as `"ACCEPT"` / `"REJECT"` — the canonical classification values
/// in result files and run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// The classifier let the prompt through.
    #[serde(rename = "ACCEPT")]
    Accept,

    /// The classifier rejected the prompt.
    #[serde(rename = "REJECT")]
    Reject,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Accept => "ACCEPT",
            Verdict::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
