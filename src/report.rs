//! Verdict tallying and incremental result persistence.

use crate::corpus::RowPayload;
use crate::{RagFoldResult, Verdict};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;

/// Accept/reject counts for one full multi-fold run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub accept: usize,
    pub reject: usize,
}

impl Tally {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Accept => self.accept += 1,
            Verdict::Reject => self.reject += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.accept + self.reject
    }
}

impl fmt::Display for Tally {
    /// The operator-facing run summary: `{ACCEPT: n, REJECT: m}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ACCEPT: {}, REJECT: {}}}", self.accept, self.reject)
    }
}

/// One persisted result. Structured rows keep their original object with a
/// `Classification` field added; raw-string rows become `[text, classification]`
/// pairs. Never mutated after being written.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResultRecord {
    Structured(Map<String, Value>),
    Raw(String, Verdict),
}

impl ResultRecord {
    pub fn new(payload: RowPayload, verdict: Verdict) -> Self {
        match payload {
            RowPayload::Structured(mut map) => {
                map.insert(
                    "Classification".to_string(),
                    Value::String(verdict.as_str().to_string()),
                );
                ResultRecord::Structured(map)
            }
            RowPayload::Raw(text) => ResultRecord::Raw(text, verdict),
        }
    }
}

/// A result record together with the fold that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldRecord {
    pub fold: usize,
    pub record: ResultRecord,
}

/// Writes a JSON array one element at a time, flushing after each append so a
/// mid-run abort loses at most the in-flight item.
pub struct JsonArrayWriter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonArrayWriter<W> {
    pub fn new(mut writer: W) -> RagFoldResult<Self> {
        writer.write_all(b"[")?;
        writer.flush()?;
        Ok(Self { writer, written: 0 })
    }

    pub fn append(&mut self, record: &ResultRecord) -> RagFoldResult<()> {
        if self.written > 0 {
            self.writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Closes the array and hands the underlying writer back.
    pub fn finish(mut self) -> RagFoldResult<W> {
        self.writer.write_all(b"]")?;
        self.writer.flush()?;
        Ok(self.writer)
    }

    pub fn len(&self) -> usize {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }
}
