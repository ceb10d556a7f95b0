//! Doctest Accept: output synchronization engine for documentation tests
//!
//! When a doctest's captured output no longer matches the expected-output
//! block written next to it, this engine rewrites the block in place so the
//! maintainer can accept the new output without hand-editing, leaving every
//! other byte of the file untouched.
//!
//! # Architecture
//!
//! All accepted changes compile down to a single primitive: [`PendingEdit`],
//! a byte-span replacement computed against a file's pristine snapshot.
//! Intelligence lives in span acquisition (the locator) and batching, not in
//! application: batches are materialized back-to-front so offsets never
//! drift, then committed atomically per file.
//!
//! # Safety
//!
//! - All spans are located against pristine text captured at session start
//! - Atomic file writes (tempfile + fsync + rename)
//! - Concurrent external modification detected and skipped, never clobbered
//! - All mutation deferred to commit points; an aborted session writes nothing
//! - Idempotent: a second run over accepted files produces zero edits
//!
//! # Example
//!
//! ```no_run
//! use doctest_accept::{
//!     AcceptConfig, ActualOutput, CompareOptions, Example, FileSnapshot, SyncSession,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SyncSession::new(AcceptConfig::default());
//! session.register_file(FileSnapshot::capture("pkg/mod.py")?)?;
//!
//! // The host parser found one example whose expected block is line 4.
//! let example = Example::new("pkg/mod.py", 0, 3..4, "3", CompareOptions::default());
//! session.register_example(example.clone())?;
//! session.start()?;
//!
//! // The host executor reports what actually ran.
//! session.record_result(example.id(), ActualOutput::text("4"))?;
//!
//! let report = session.finalize()?;
//! println!("accepted {} edits", report.total_applied());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod compare;
pub mod config;
pub mod edit;
pub mod example;
pub mod locate;
pub mod render;
pub mod report;
pub mod session;
pub mod snapshot;
pub mod writer;

// Re-exports
pub use batch::{BatchError, EditBatchManager, FileBatch};
pub use compare::{compare, CompareOptions, Verdict};
pub use config::{load_from_path, load_from_str, AcceptConfig, ConfigError};
pub use edit::{ByteSpan, EditError, PendingEdit};
pub use example::{ActualOutput, ActualResult, Example, ExampleId, FileId};
pub use locate::{locate, LocateError, LocatedBlock};
pub use render::render_block;
pub use report::{unified_diff, Diagnostic, FileReport, SessionReport};
pub use session::{CommitMode, SessionError, SessionState, SyncSession};
pub use snapshot::{FileSnapshot, Fingerprint, Newline, SnapshotError};
pub use writer::{commit, CommitError, CommitOutcome, WriteMode};
