//! Session coordinator: drives comparison, location, batching, and commits
//! across the lifetime of one test run.
//!
//! The session is an explicit object constructed at run start and torn down
//! at `Done` - there is no ambient global state. Result recording is safe
//! under concurrent calls from parallel test workers; all mutation of
//! session state happens under one internal lock, which also makes commits
//! exclusive per file.
//!
//! State machine: `Collecting -> Running -> Finalizing -> Done`. A session
//! aborted before finalizing performs no writes at all: every edit is
//! deferred to a single materialize-then-commit step, so a half-finished
//! run never leaves a half-edited file.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;

use crate::batch::{BatchError, EditBatchManager};
use crate::compare::{compare, Verdict};
use crate::config::AcceptConfig;
use crate::edit::PendingEdit;
use crate::example::{ActualOutput, ActualResult, Example, ExampleId, FileId};
use crate::locate::locate;
use crate::render::render_block;
use crate::report::SessionReport;
use crate::snapshot::FileSnapshot;
use crate::writer::{commit, CommitError};

/// When accumulated edits are committed to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Commit a file as soon as its last outstanding example reports. Bounds
    /// memory and narrows the concurrent-modification window, at the cost of
    /// writes landing while the run is still going.
    PerFile,
    /// Commit everything once, at session end.
    #[default]
    SessionEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Collecting,
    Running,
    Finalizing,
    Done,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("operation requires session state {expected:?}, but session is {actual:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    #[error("session is finished; no further results accepted")]
    SessionClosed,

    #[error("result delivered for unknown example {example}")]
    UnknownExample { example: ExampleId },

    #[error("file {file} was not registered during collection")]
    UnknownFile { file: FileId },

    #[error("example {example} registered twice during collection")]
    DuplicateExample { example: ExampleId },

    #[error("duplicate result delivered for example {example}")]
    DuplicateResult { example: ExampleId },
}

struct Inner {
    state: SessionState,
    config: AcceptConfig,
    snapshots: BTreeMap<FileId, FileSnapshot>,
    examples: HashMap<ExampleId, Example>,
    /// Examples registered but not yet reported, per file. Drives the
    /// per-file commit mode.
    outstanding: BTreeMap<FileId, usize>,
    delivered: HashSet<ExampleId>,
    batches: EditBatchManager,
    committed: BTreeSet<FileId>,
    report: SessionReport,
    next_seq: u64,
}

/// One test session's synchronization state.
pub struct SyncSession {
    inner: Mutex<Inner>,
}

impl SyncSession {
    pub fn new(config: AcceptConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Collecting,
                config,
                snapshots: BTreeMap::new(),
                examples: HashMap::new(),
                outstanding: BTreeMap::new(),
                delivered: HashSet::new(),
                batches: EditBatchManager::new(),
                committed: BTreeSet::new(),
                report: SessionReport::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// A point-in-time copy of the accumulated diagnostics.
    pub fn report(&self) -> SessionReport {
        self.inner.lock().report.clone()
    }

    /// Register a file's pristine snapshot. Collection phase only.
    pub fn register_file(&self, snapshot: FileSnapshot) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        require_state(&inner, SessionState::Collecting)?;
        inner.outstanding.entry(snapshot.file().clone()).or_insert(0);
        inner.snapshots.insert(snapshot.file().clone(), snapshot);
        Ok(())
    }

    /// Register a discovered example. Its file must already be registered.
    pub fn register_example(&self, example: Example) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        require_state(&inner, SessionState::Collecting)?;
        if !inner.snapshots.contains_key(example.file()) {
            return Err(SessionError::UnknownFile {
                file: example.file().clone(),
            });
        }
        let id = example.id();
        if inner.examples.contains_key(&id) {
            return Err(SessionError::DuplicateExample { example: id });
        }
        *inner.outstanding.entry(example.file().clone()).or_insert(0) += 1;
        inner.examples.insert(id, example);
        Ok(())
    }

    /// Collection is complete; begin accepting results.
    pub fn start(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        require_state(&inner, SessionState::Collecting)?;
        inner.state = SessionState::Running;
        Ok(())
    }

    /// Record one example's execution result.
    ///
    /// Safe to call concurrently from parallel workers. On mismatch the
    /// example's expected-output block is located against the pristine
    /// snapshot and a pending edit is queued; every failure along that path
    /// degrades to a diagnostic rather than an abort.
    pub fn record_result(
        &self,
        example: ExampleId,
        output: ActualOutput,
    ) -> Result<Verdict, SessionError> {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Running => {}
            SessionState::Collecting => {
                return Err(SessionError::InvalidState {
                    expected: SessionState::Running,
                    actual: SessionState::Collecting,
                })
            }
            SessionState::Finalizing | SessionState::Done => {
                return Err(SessionError::SessionClosed)
            }
        }

        if !inner.examples.contains_key(&example) {
            return Err(SessionError::UnknownExample { example });
        }
        if inner.delivered.contains(&example) {
            tracing::warn!(example = %example, "duplicate result delivery ignored");
            inner
                .report
                .record_duplicate(&example, "result delivered more than once");
            return Err(SessionError::DuplicateResult { example });
        }
        inner.delivered.insert(example.clone());

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let result = ActualResult {
            example: example.clone(),
            output,
            seq,
        };

        let discovered = inner.examples[&example].clone();
        let verdict = compare(discovered.expected(), &result.output, discovered.options());

        match &verdict {
            Verdict::Match => {
                inner.report.record_match(discovered.file());
            }
            Verdict::Mismatch { actual } => {
                record_mismatch(&mut inner, &discovered, actual, result.seq);
            }
        }

        let file = discovered.file().clone();
        let mut commit_now = false;
        if let Some(count) = inner.outstanding.get_mut(&file) {
            *count = count.saturating_sub(1);
            commit_now = *count == 0 && inner.config.commit_mode == CommitMode::PerFile;
        }
        if commit_now {
            commit_file(&mut inner, &file);
        }

        Ok(verdict)
    }

    /// All examples have reported (or the host decided to stop): materialize
    /// and commit every file with a non-empty batch, then close the session.
    pub fn finalize(&self) -> Result<SessionReport, SessionError> {
        let mut inner = self.inner.lock();
        require_state(&inner, SessionState::Running)?;
        inner.state = SessionState::Finalizing;

        for file in inner.batches.files() {
            commit_file(&mut inner, &file);
        }

        inner.state = SessionState::Done;
        Ok(inner.report.clone())
    }

    /// Abandon the session without writing anything. Terminal.
    pub fn abort(&self) -> SessionReport {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Done {
            tracing::warn!("session aborted; no files were written");
            inner.state = SessionState::Done;
        }
        inner.report.clone()
    }
}

fn require_state(inner: &Inner, expected: SessionState) -> Result<(), SessionError> {
    if inner.state == expected {
        Ok(())
    } else {
        Err(SessionError::InvalidState {
            expected,
            actual: inner.state,
        })
    }
}

fn record_mismatch(inner: &mut Inner, example: &Example, actual: &str, seq: u64) {
    let snapshot = &inner.snapshots[example.file()];

    let block = match locate(snapshot.text(), example) {
        Ok(block) => block,
        Err(err) => {
            tracing::warn!(example = %example.id(), error = %err, "cannot locate expected-output block");
            inner.report.record_locate_failure(&example.id(), err.to_string());
            return;
        }
    };

    let new_text = render_block(
        actual,
        &block.indent,
        snapshot.newline(),
        block.newline_terminated,
    );
    let edit = PendingEdit::new(example.id(), block.span, new_text, seq);

    match inner.batches.record(edit) {
        Ok(()) => {}
        Err(BatchError::DuplicateEdit { example }) => {
            tracing::warn!(example = %example, "duplicate edit rejected");
            inner
                .report
                .record_duplicate(&example, "edit recorded more than once");
        }
        Err(err) => {
            tracing::warn!(example = %example.id(), error = %err, "cannot queue edit");
            inner.report.record_locate_failure(&example.id(), err.to_string());
        }
    }
}

/// Materialize and commit one file's batch. Failures become diagnostics;
/// other files are unaffected.
fn commit_file(inner: &mut Inner, file: &FileId) {
    if inner.committed.contains(file) {
        return;
    }
    inner.committed.insert(file.clone());

    let Some(batch) = inner.batches.take(file) else {
        return;
    };
    if batch.is_empty() {
        return;
    }

    let Some(snapshot) = inner.snapshots.get(file) else {
        // Unreachable by construction: edits only exist for registered files.
        inner
            .report
            .record_write_failure(file, "no pristine snapshot for file");
        return;
    };

    let new_text = match batch.materialize(snapshot.text()) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(file = %file, error = %err, "materialize failed");
            inner.report.record_write_failure(file, err.to_string());
            return;
        }
    };

    match commit(snapshot, &new_text, inner.config.write_mode) {
        Ok(outcome) => {
            inner.report.record_applied(file, batch.len(), outcome.path);
        }
        Err(CommitError::ConcurrentModification { .. }) => {
            tracing::warn!(file = %file, "file changed on disk; skipping its edits");
            inner.report.record_concurrent_modification(file);
        }
        Err(err @ CommitError::WriteFailed { .. }) => {
            tracing::warn!(file = %file, error = %err, "write failed; original left intact");
            inner.report.record_write_failure(file, err.to_string());
        }
    }
}
