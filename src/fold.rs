//! Cross-validation fold partitioning.
//!
//! A fold assignment is a pure function of `(scheme, outer_range, fold, index, total)` —
//! no state is carried between folds or between the two corpora it is applied to.
//! In one run the same fold index partitions both the mutation corpus (choosing the
//! retrieval training set) and the test file (choosing which rows are evaluated),
//! each with its own total count.

/// Whether an item belongs to the training or the test side of a fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Train,
    Test,
}

/// The cross-validation scheme for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossValidation {
    /// Five contiguous blocks; block `i` is held out in fold `i`.
    SimpleFifths,

    /// Five interleaved blocks: item `j` is held out in fold `j mod 5`.
    EveryFifth,

    /// `corpus_len / 5` folds, each holding out one small contiguous group.
    JackknifedBasePrompts,

    /// No partitioning: the full corpus trains, every test row is evaluated
    /// in the single fold. Used when evaluating prompts a model trained on
    /// all mutations is expected to accept.
    Disabled,
}

impl CrossValidation {
    /// Number of folds for a corpus of `corpus_len` training documents.
    ///
    /// `JackknifedBasePrompts` derives its fold count from the corpus size and is
    /// clamped to at least one fold so tiny corpora still get evaluated.
    pub fn outer_range(self, corpus_len: usize) -> usize {
        match self {
            CrossValidation::SimpleFifths | CrossValidation::EveryFifth => 5,
            CrossValidation::JackknifedBasePrompts => (corpus_len / 5).max(1),
            CrossValidation::Disabled => 1,
        }
    }

    /// The test predicate: is item `index` of a corpus of `total` held out in `fold`?
    ///
    /// `Disabled` never holds anything out of the training corpus.
    pub fn is_test(self, outer: usize, fold: usize, index: usize, total: usize) -> bool {
        match self {
            CrossValidation::SimpleFifths => block_of(index, total, 5) == fold,
            CrossValidation::EveryFifth => index % 5 == fold,
            CrossValidation::JackknifedBasePrompts => block_of(index, total, outer) == fold,
            CrossValidation::Disabled => false,
        }
    }

    /// Train/test role of a training-corpus item in the given fold.
    pub fn assign(self, outer: usize, fold: usize, index: usize, total: usize) -> Role {
        if self.is_test(outer, fold, index, total) {
            Role::Test
        } else {
            Role::Train
        }
    }

    /// Is test-file row `index` evaluated in the given fold?
    ///
    /// Same predicate as [`is_test`](Self::is_test), except `Disabled`
    /// evaluates every row in its single fold.
    pub fn selects_row(self, outer: usize, fold: usize, index: usize, total: usize) -> bool {
        matches!(self, CrossValidation::Disabled) || self.is_test(outer, fold, index, total)
    }
}

/// Contiguous block number of `index` when `total` items are cut into `blocks` blocks.
///
/// Integer form of `floor(index / (total / blocks))`; exact, and always in
/// `[0, blocks)` for `index < total`.
fn block_of(index: usize, total: usize, blocks: usize) -> usize {
    index * blocks / total
}
