//! On-disk artifact cache primitives
//!
//! A cache root holds one entry per artifact, named by the key generator.
//! Nothing besides the directory tree is persisted; membership is always
//! reconstructed by scanning.
//!
//! # Entry Shapes
//!
//! | Shape | Example | Timestamp |
//! |-------|---------|-----------|
//! | Flat file | `libfoo_0123456789abcdef.jar` | file mtime |
//! | Directory | `lib_0123456789abcdef.aar/` | `aar.timestamp` mtime |
//! | Merged directory | `com.example_0123456789abcdef.mergedaar/` | none |

pub mod cancel;
pub mod diff;
pub mod executor;
pub mod fs;
pub mod key;
pub mod merge;
pub mod state;
pub mod unpack;

pub use cancel::CancelToken;
pub use diff::{diff, CacheDiff};
pub use executor::{Executor, Phase, PhaseOutcome, ProgressSink, UnitFailure};
pub use key::{group_key, key_for, key_stem, EntryKind};
pub use merge::{merge_group, MergeMember, MergeOutcome};
pub use state::{scan, CacheEntry, CacheState, EntryShape};
pub use unpack::{unpack, ExtraFile, Stamp};
