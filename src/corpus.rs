//! Prompt corpora: the mutation corpus that populates retrieval indexes, and
//! the test files whose rows are classified.

use crate::RagFoldResult;
use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One entry of the mutation corpus file: an adversarial base prompt together
/// with its paraphrased/obfuscated variants. Read-only after loading.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptRecord {
    #[serde(rename = "Prompts")]
    pub prompt: String,

    #[serde(rename = "Mutations")]
    pub mutations: Vec<String>,

    #[serde(rename = "Scenario Description", default)]
    pub scenario: Option<String>,

    #[serde(rename = "benchmark_file_line", default)]
    pub source_line: Option<Value>,
}

/// A single mutated prompt, the unit stored in and retrieved from a fold's
/// index. Carries the owning base prompt so leakage filters never have to look
/// the ownership up again.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationDoc {
    pub text: String,
    pub base_prompt: String,
    pub scenario: Option<String>,
    pub source_line: Option<Value>,
}

/// All mutation documents eligible for retrieval training.
///
/// Mutations whose owning base prompt is in the ignore set are dropped here,
/// at load time — they can never reach a fold's training set.
#[derive(Debug, Clone)]
pub struct MutationCorpus {
    docs: Vec<MutationDoc>,
    ignored_base_prompts: usize,
}

impl MutationCorpus {
    pub fn load(path: &Path, ignore: &HashSet<String>) -> RagFoldResult<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading mutation corpus {}", path.display()))?;
        Self::from_json_str(&data, ignore)
            .with_context(|| format!("parsing mutation corpus {}", path.display()))
    }

    pub fn from_json_str(data: &str, ignore: &HashSet<String>) -> RagFoldResult<Self> {
        let records: Vec<PromptRecord> = serde_json::from_str(data)?;
        Ok(Self::from_records(records, ignore))
    }

    pub fn from_records(records: Vec<PromptRecord>, ignore: &HashSet<String>) -> Self {
        let ignored_base_prompts = records
            .iter()
            .filter(|record| ignore.contains(&record.prompt))
            .count();

        let docs = records
            .into_iter()
            .filter(|record| !ignore.contains(&record.prompt))
            .flat_map(|record| {
                let PromptRecord {
                    prompt,
                    mutations,
                    scenario,
                    source_line,
                } = record;
                mutations.into_iter().map(move |text| MutationDoc {
                    text,
                    base_prompt: prompt.clone(),
                    scenario: scenario.clone(),
                    source_line: source_line.clone(),
                })
            })
            .collect();

        Self {
            docs,
            ignored_base_prompts,
        }
    }

    pub fn docs(&self) -> &[MutationDoc] {
        &self.docs
    }

    /// Number of mutation documents (the `N` fold counts derive from).
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// How many base prompts the ignore set removed at load time.
    pub fn ignored_base_prompts(&self) -> usize {
        self.ignored_base_prompts
    }
}

/// The shape a test row arrived in. Structured rows keep their full object so
/// results can augment rather than replace them.
#[derive(Debug, Clone, PartialEq)]
pub enum RowPayload {
    Structured(Map<String, Value>),
    Raw(String),
}

/// One row of the test input file, with its queryable prompt text resolved
/// once at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRow {
    pub payload: RowPayload,
    pub prompt: String,
}

impl TestRow {
    pub fn raw(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            payload: RowPayload::Raw(text.clone()),
            prompt: text,
        }
    }

    /// Scenario context shown to a human arbiter, where the row carries one.
    pub fn scenario(&self) -> Option<&str> {
        match &self.payload {
            RowPayload::Structured(map) => {
                map.get("Scenario Description").and_then(Value::as_str)
            }
            RowPayload::Raw(_) => None,
        }
    }
}

/// Loads the test input file, dispatching on extension.
///
/// `prompt_field` is the column/field holding the prompt text in structured
/// rows; bare JSON strings are their own prompt text. Anything other than
/// `.csv` or `.json` is a fatal configuration error, raised before any work.
pub fn load_test_rows(path: &Path, prompt_field: &str) -> RagFoldResult<Vec<TestRow>> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match extension {
        "csv" => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("reading test input {}", path.display()))?;
            rows_from_csv(&data, prompt_field)
        }
        "json" => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("reading test input {}", path.display()))?;
            rows_from_json(&data, prompt_field)
        }
        _ => bail!("test input file type not supported: {}", path.display()),
    }
}

pub fn rows_from_csv(data: &str, prompt_field: &str) -> RagFoldResult<Vec<TestRow>> {
    let mut reader = csv::ReaderBuilder::new().from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let mut map = Map::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            map.insert(header.to_string(), Value::String(field.to_string()));
        }
        let prompt = map
            .get(prompt_field)
            .and_then(Value::as_str)
            .with_context(|| format!("test row {} has no '{}' column", line + 1, prompt_field))?
            .to_string();
        rows.push(TestRow {
            payload: RowPayload::Structured(map),
            prompt,
        });
    }
    Ok(rows)
}

pub fn rows_from_json(data: &str, prompt_field: &str) -> RagFoldResult<Vec<TestRow>> {
    let values: Vec<Value> = serde_json::from_str(data)?;
    values
        .into_iter()
        .enumerate()
        .map(|(line, value)| match value {
            Value::String(text) => Ok(TestRow::raw(text)),
            Value::Object(map) => {
                let prompt = map
                    .get(prompt_field)
                    .and_then(Value::as_str)
                    .with_context(|| {
                        format!("test row {} has no '{}' field", line + 1, prompt_field)
                    })?
                    .to_string();
                Ok(TestRow {
                    payload: RowPayload::Structured(map),
                    prompt,
                })
            }
            other => bail!("test row {} is neither a string nor an object: {other}", line + 1),
        })
        .collect()
}

/// Reads an ignore file: one base prompt per line, blank lines skipped.
pub fn load_ignore_set(path: Option<&Path>) -> RagFoldResult<HashSet<String>> {
    let Some(path) = path else {
        return Ok(HashSet::new());
    };
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading ignore file {}", path.display()))?;
    Ok(data
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}
