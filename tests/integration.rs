use async_trait::async_trait;
use ragfold::corpus::{rows_from_csv, MutationCorpus, MutationDoc, PromptRecord, TestRow};
use ragfold::fold::CrossValidation;
use ragfold::normalizer::Arbiter;
use ragfold::rag::{DocumentIndex, Generator, IndexFactory};
use ragfold::report::JsonArrayWriter;
use ragfold::runner::{Harness, Pipeline};
use ragfold::RagFoldResult;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

// 1. Mock index: similarity order is arrival order; enough to observe what
//    each fold was trained on.
struct RecordingIndex {
    docs: Vec<MutationDoc>,
    log: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl DocumentIndex for RecordingIndex {
    async fn add_documents(&mut self, docs: Vec<MutationDoc>) -> RagFoldResult<()> {
        self.log
            .lock()
            .unwrap()
            .push(docs.iter().map(|d| d.text.clone()).collect());
        self.docs.extend(docs);
        Ok(())
    }

    async fn retrieve(&self, _query: &str, k: usize) -> RagFoldResult<Vec<MutationDoc>> {
        Ok(self.docs.iter().take(k).cloned().collect())
    }
}

struct RecordingFactory {
    // One entry per created index, holding the documents it was trained on.
    log: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RecordingFactory {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl IndexFactory for RecordingFactory {
    fn create(&self) -> Box<dyn DocumentIndex> {
        Box::new(RecordingIndex {
            docs: Vec::new(),
            log: Arc::clone(&self.log),
        })
    }
}

// 2. Stub generator: fixed response, records every question asked.
struct StubGenerator {
    response: String,
    questions: Mutex<Vec<String>>,
}

impl StubGenerator {
    fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            questions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, question: &str, _context: &str) -> RagFoldResult<String> {
        self.questions.lock().unwrap().push(question.to_string());
        Ok(self.response.clone())
    }
}

// 3. Arbiter that must never be consulted: stub responses are unambiguous.
struct UnreachableArbiter;

#[async_trait]
impl Arbiter for UnreachableArbiter {
    async fn request_token(
        &self,
        raw_output: &str,
        _context: Option<&str>,
    ) -> RagFoldResult<String> {
        panic!("unexpected escalation for: {raw_output}");
    }
}

fn corpus_of(bases: usize, mutations_each: usize, ignore: &HashSet<String>) -> MutationCorpus {
    let records = (0..bases)
        .map(|i| PromptRecord {
            prompt: format!("base-{i}"),
            mutations: (0..mutations_each)
                .map(|m| format!("mut-{i}-{m}"))
                .collect(),
            scenario: Some(format!("scenario-{i}")),
            source_line: None,
        })
        .collect();
    MutationCorpus::from_records(records, ignore)
}

fn csv_rows(bases: usize) -> Vec<TestRow> {
    let mut data = String::from("Prompts,Line\n");
    for i in 0..bases {
        data.push_str(&format!("base-{i},{i}\n"));
    }
    rows_from_csv(&data, "Prompts").unwrap()
}

#[tokio::test]
async fn test_simple_fifths_tests_each_row_exactly_once() {
    // 10 base prompts x 3 mutations, SimpleFifths over a 10-row test file:
    // five folds, each testing two rows, summing to 10.
    let ignore = HashSet::new();
    let corpus = corpus_of(10, 3, &ignore);
    let rows = csv_rows(10);

    let factory = RecordingFactory::new();
    let generator = StubGenerator::new("REJECT");
    let arbiter = UnreachableArbiter;
    let harness = Harness::new(CrossValidation::SimpleFifths, 4);
    let mut sink = JsonArrayWriter::new(Vec::new()).unwrap();

    let pipeline = Pipeline {
        index_factory: &factory,
        generator: &generator,
        arbiter: &arbiter,
    };
    let summary = harness
        .run(&corpus, &rows, &ignore, &pipeline, &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.fold_sizes, vec![2, 2, 2, 2, 2]);
    assert_eq!(summary.fold_sizes.iter().sum::<usize>(), 10);
    assert_eq!(summary.tally.reject, 10);
    assert_eq!(summary.tally.accept, 0);

    // Every row was asked exactly once across the whole run.
    let mut questions = generator.questions.lock().unwrap().clone();
    questions.sort();
    let mut expected: Vec<String> = (0..10).map(|i| format!("base-{i}")).collect();
    expected.sort();
    assert_eq!(questions, expected);

    // Five fresh indexes, each trained on 24 of the 30 mutations.
    let trained = factory.log.lock().unwrap();
    assert_eq!(trained.len(), 5);
    for fold_docs in trained.iter() {
        assert_eq!(fold_docs.len(), 24);
    }
}

#[tokio::test]
async fn test_disabled_scheme_accepts_everything_let_through() {
    let ignore = HashSet::new();
    let corpus = corpus_of(4, 2, &ignore);
    let rows = vec![
        TestRow::raw("should pass one"),
        TestRow::raw("should pass two"),
        TestRow::raw("should pass three"),
    ];

    let factory = RecordingFactory::new();
    let generator = StubGenerator::new("LET THROUGH");
    let arbiter = UnreachableArbiter;
    let harness = Harness::new(CrossValidation::Disabled, 4);
    let mut sink = JsonArrayWriter::new(Vec::new()).unwrap();

    let pipeline = Pipeline {
        index_factory: &factory,
        generator: &generator,
        arbiter: &arbiter,
    };
    let summary = harness
        .run(&corpus, &rows, &ignore, &pipeline, &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.tally.accept, 3);
    assert_eq!(summary.tally.reject, 0);
    assert_eq!(summary.fold_sizes, vec![3]);

    // Disabled keeps the whole mutation corpus as training material.
    let trained = factory.log.lock().unwrap();
    assert_eq!(trained.len(), 1);
    assert_eq!(trained[0].len(), 8);

    // Raw-string rows persist as [text, classification] pairs.
    let bytes = sink.finish().unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed.len(), 3);
    assert_eq!(parsed[0][1], "ACCEPT");
}

#[tokio::test]
async fn test_ignored_rows_produce_no_record_and_no_tally() {
    let ignore: HashSet<String> = ["base-1".to_string()].into();
    let corpus = corpus_of(3, 2, &ignore);
    let rows = csv_rows(3);

    let factory = RecordingFactory::new();
    let generator = StubGenerator::new("REJECT");
    let arbiter = UnreachableArbiter;
    let harness = Harness::new(CrossValidation::Disabled, 4);
    let mut sink = JsonArrayWriter::new(Vec::new()).unwrap();

    let pipeline = Pipeline {
        index_factory: &factory,
        generator: &generator,
        arbiter: &arbiter,
    };
    let summary = harness
        .run(&corpus, &rows, &ignore, &pipeline, &mut sink)
        .await
        .unwrap();

    // base-1 is skipped entirely: two results, two tally entries.
    assert_eq!(summary.tally.total(), 2);
    assert_eq!(summary.records.len(), 2);

    // Its mutations never entered the corpus either.
    assert_eq!(corpus.len(), 4);
    assert_eq!(corpus.ignored_base_prompts(), 1);
    let trained = factory.log.lock().unwrap();
    assert!(trained[0].iter().all(|text| !text.starts_with("mut-1")));

    let bytes = sink.finish().unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed.len(), 2);
    for entry in &parsed {
        assert_ne!(entry["Prompts"], "base-1");
    }
}

#[tokio::test]
async fn test_output_round_trip_has_canonical_classifications() {
    let ignore = HashSet::new();
    let corpus = corpus_of(5, 1, &ignore);
    let rows = csv_rows(5);

    let factory = RecordingFactory::new();
    let generator = StubGenerator::new("I must REJECT this");
    let arbiter = UnreachableArbiter;
    let harness = Harness::new(CrossValidation::EveryFifth, 4);
    let mut sink = JsonArrayWriter::new(Vec::new()).unwrap();

    let pipeline = Pipeline {
        index_factory: &factory,
        generator: &generator,
        arbiter: &arbiter,
    };
    let summary = harness
        .run(&corpus, &rows, &ignore, &pipeline, &mut sink)
        .await
        .unwrap();
    assert_eq!(summary.tally.reject, 5);

    let bytes = sink.finish().unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed.len(), 5);
    for entry in &parsed {
        let classification = entry["Classification"].as_str().unwrap();
        assert!(classification == "ACCEPT" || classification == "REJECT");
        // The original row object survives alongside the new field.
        assert!(entry["Line"].is_string());
    }
}

#[tokio::test]
async fn test_fold_tags_cover_all_folds() {
    let ignore = HashSet::new();
    let corpus = corpus_of(10, 2, &ignore);
    let rows = csv_rows(10);

    let factory = RecordingFactory::new();
    let generator = StubGenerator::new("REJECT");
    let arbiter = UnreachableArbiter;
    let harness = Harness::new(CrossValidation::EveryFifth, 4);
    let mut sink = JsonArrayWriter::new(Vec::new()).unwrap();

    let pipeline = Pipeline {
        index_factory: &factory,
        generator: &generator,
        arbiter: &arbiter,
    };
    let summary = harness
        .run(&corpus, &rows, &ignore, &pipeline, &mut sink)
        .await
        .unwrap();

    let folds_seen: HashSet<usize> = summary.records.iter().map(|r| r.fold).collect();
    assert_eq!(folds_seen, (0..5).collect::<HashSet<usize>>());
}
