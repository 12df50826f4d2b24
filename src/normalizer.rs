//! Normalizes free-text classifier output into a binary [`Verdict`].
//!
//! Unambiguous output is resolved by marker scanning alone. Anything else is
//! escalated to a human arbiter and the pipeline blocks until the human
//! answers with one of exactly two tokens — there is no timeout and no
//! cancellation, so the escalation loop is the run's only suspension point.

use crate::{RagFoldResult, Verdict};
use async_trait::async_trait;
use std::io::{self, BufRead, Write};

/// Token a human types to accept an item.
pub const ACCEPT_TOKEN: &str = "LT";
/// Token a human types to reject an item.
pub const REJECT_TOKEN: &str = "R";

/// Outcome of scanning raw output for the two verdict markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerScan {
    Reject,
    Accept,
    Ambiguous,
}

/// Case-insensitive scan for the `REJECT` / `LET THROUGH` markers.
///
/// `REJECT` is checked first: output containing both markers normalizes to
/// [`MarkerScan::Reject`]. The ordering is deliberate and load-bearing; tests
/// pin it.
pub fn scan_markers(raw: &str) -> MarkerScan {
    let upper = raw.to_uppercase();
    if upper.contains("REJECT") {
        MarkerScan::Reject
    } else if upper.contains("LET THROUGH") {
        MarkerScan::Accept
    } else {
        MarkerScan::Ambiguous
    }
}

/// The manual-classification service boundary.
///
/// One call yields one candidate token from the human. Validation and
/// re-prompting live on the caller's side: [`normalize`] keeps requesting
/// until it gets [`ACCEPT_TOKEN`] or [`REJECT_TOKEN`].
#[async_trait]
pub trait Arbiter: Send + Sync {
    /// Shows the ambiguous raw output (and scenario context, if any) and
    /// returns whatever token the human supplied.
    async fn request_token(&self, raw_output: &str, context: Option<&str>)
        -> RagFoldResult<String>;
}

/// Maps raw classifier output to a [`Verdict`], escalating to `arbiter` when
/// neither marker is present.
///
/// The escalation loop has exactly two exits, `Accept` and `Reject`; an
/// invalid token re-enters the loop.
pub async fn normalize(
    raw: &str,
    context: Option<&str>,
    arbiter: &dyn Arbiter,
) -> RagFoldResult<Verdict> {
    match scan_markers(raw) {
        MarkerScan::Reject => Ok(Verdict::Reject),
        MarkerScan::Accept => Ok(Verdict::Accept),
        MarkerScan::Ambiguous => loop {
            let token = arbiter.request_token(raw, context).await?;
            match token.as_str() {
                ACCEPT_TOKEN => return Ok(Verdict::Accept),
                REJECT_TOKEN => return Ok(Verdict::Reject),
                _ => continue,
            }
        },
    }
}

/// Human arbitration over stdin.
///
/// Blocks the whole pipeline while waiting for input; the run is sequential
/// by contract.
pub struct StdinArbiter;

#[async_trait]
impl Arbiter for StdinArbiter {
    async fn request_token(
        &self,
        raw_output: &str,
        context: Option<&str>,
    ) -> RagFoldResult<String> {
        let mut stdout = io::stdout();
        if let Some(scenario) = context {
            writeln!(stdout, "SCENARIO: {scenario}")?;
        }
        write!(
            stdout,
            "Got something other than LET THROUGH or REJECT: {raw_output}\n\
             Please manually classify it by typing either {ACCEPT_TOKEN} (for LET THROUGH) \
             or {REJECT_TOKEN} (for REJECT): "
        )?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}
