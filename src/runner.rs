//! The sequential evaluation engine: drives every fold of a run, one test row
//! at a time, through retrieve → generate → normalize → persist.

use crate::corpus::{MutationCorpus, MutationDoc, TestRow};
use crate::fold::{CrossValidation, Role};
use crate::normalizer::{normalize, Arbiter};
use crate::rag::{Generator, IndexFactory};
use crate::report::{FoldRecord, JsonArrayWriter, ResultRecord, Tally};
use crate::{RagFoldResult, Verdict};
use colored::*;
use std::collections::HashSet;
use std::io::{self, Write};
use std::time::Instant;

/// The external services one run talks to. Borrowed, not owned: the harness
/// orchestrates, the caller decides what sits behind each seam.
pub struct Pipeline<'a> {
    pub index_factory: &'a dyn IndexFactory,
    pub generator: &'a dyn Generator,
    pub arbiter: &'a dyn Arbiter,
}

/// Outcome of a full multi-fold run.
#[derive(Debug)]
pub struct RunSummary {
    pub tally: Tally,
    /// Rows evaluated per fold, in fold order.
    pub fold_sizes: Vec<usize>,
    /// Every persisted record, tagged with its producing fold.
    pub records: Vec<FoldRecord>,
}

pub struct Harness {
    scheme: CrossValidation,
    top_k: usize,
}

impl Harness {
    pub fn new(scheme: CrossValidation, top_k: usize) -> Self {
        Self { scheme, top_k }
    }

    /// Runs every fold sequentially.
    ///
    /// Per fold: a brand-new index is built from the fold's training
    /// partition, then each selected test row is classified and appended to
    /// `sink` immediately. The index is dropped at the end of the fold; no
    /// retrieval state crosses fold boundaries.
    ///
    /// External service failures propagate and abort the run — there is no
    /// retry layer in front of the RAG calls.
    pub async fn run<W: Write>(
        &self,
        corpus: &MutationCorpus,
        rows: &[TestRow],
        ignore: &HashSet<String>,
        pipeline: &Pipeline<'_>,
        sink: &mut JsonArrayWriter<W>,
    ) -> RagFoldResult<RunSummary> {
        let outer = self.scheme.outer_range(corpus.len());
        let started = Instant::now();

        let mut tally = Tally::default();
        let mut fold_sizes = Vec::with_capacity(outer);
        let mut records = Vec::new();

        for fold in 0..outer {
            println!(
                "Generating embeddings for cross fold {}/{} at +{:.1}s...",
                (fold + 1).to_string().cyan(),
                outer,
                started.elapsed().as_secs_f64()
            );
            let mut index = pipeline.index_factory.create();
            let training = self.training_partition(corpus, outer, fold);
            index.add_documents(training).await?;

            println!(
                "Doing retrieval for cross fold {}/{} at +{:.1}s...",
                (fold + 1).to_string().cyan(),
                outer,
                started.elapsed().as_secs_f64()
            );
            let mut evaluated = 0;
            for (row_index, row) in rows.iter().enumerate() {
                if ignore.contains(&row.prompt) {
                    continue;
                }
                if !self.scheme.selects_row(outer, fold, row_index, rows.len()) {
                    continue;
                }

                let context_docs = index.retrieve(&row.prompt, self.top_k).await?;
                let context = join_context(&context_docs);
                let raw_answer = pipeline.generator.generate(&row.prompt, &context).await?;
                let verdict = normalize(&raw_answer, row.scenario(), pipeline.arbiter).await?;

                if verdict == Verdict::Accept {
                    println!(
                        "\n[{}] {}",
                        "ACCEPT".yellow().bold(),
                        row.prompt.chars().take(50).collect::<String>()
                    );
                } else {
                    print!(".");
                    io::stdout().flush().ok();
                }

                let record = ResultRecord::new(row.payload.clone(), verdict);
                sink.append(&record)?;
                tally.record(verdict);
                records.push(FoldRecord { fold, record });
                evaluated += 1;
            }
            fold_sizes.push(evaluated);
        }

        println!("\n{}", "Run complete.".bold().white());
        Ok(RunSummary {
            tally,
            fold_sizes,
            records,
        })
    }

    /// The fold's retrieval training set: every corpus document the scheme
    /// does not hold out. Ignore-set mutations were already dropped at load.
    fn training_partition(
        &self,
        corpus: &MutationCorpus,
        outer: usize,
        fold: usize,
    ) -> Vec<MutationDoc> {
        corpus
            .docs()
            .iter()
            .enumerate()
            .filter(|(doc_index, _)| {
                self.scheme.assign(outer, fold, *doc_index, corpus.len()) == Role::Train
            })
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

fn join_context(docs: &[MutationDoc]) -> String {
    docs.iter()
        .map(|doc| doc.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
