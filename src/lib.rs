//! # Durlog
//!
//! Durlog is the journal buffer assembly path of an
//! mmap-backed storage engine's durability subsystem: the
//! piece that turns one group commit's worth of unordered
//! in-memory write notifications into a compact binary
//! write-ahead-log section.
//!
//! A build takes the commit group's intents, merges
//! overlapping and duplicate ranges down to the minimal
//! disjoint set, resolves each address back to its backing
//! (file, offset) through the mapping table, splits the rare
//! write that straddles two adjacently mapped files, and
//! serializes everything into a caller-supplied append-only
//! buffer. Actual disk transport of that buffer, crash
//! recovery, and the view manager that populates the mapping
//! table are all external collaborators.
//!
//! Address resolution is latency sensitive and heavily
//! concurrent, so the mapping table sits behind an optimistic
//! shared/exclusive lock ([`OptimisticLock`]): uncontended
//! shared acquisition is a single atomic increment, and only
//! the rare exclusive mutation (view creation, teardown,
//! remap) pays for real locking.
//!
//! Everything here is blocking and runs to completion; there
//! are no retries. Resolution failure is a durability
//! invariant violation surfaced as [`FatalError`], which the
//! driving process is expected to treat as unrecoverable.
//!
//! # Examples
//!
//! ```
//! use durlog::{
//!     CommitGroup, Durability, LogBuffer, MappedRegion, MappingTable, RelativePath,
//! };
//!
//! let views = MappingTable::new();
//! views.insert(MappedRegion::new(
//!     0x1000,
//!     vec![7u8; 4096].into_boxed_slice(),
//!     3,
//!     RelativePath::new("db/collection.3"),
//! ));
//!
//! let durability = Durability::new(views, RelativePath::local());
//! durability.open_log_file(1);
//!
//! let mut group = CommitGroup::new();
//! group.note(0x1010, 16);
//! group.note(0x1018, 16); // overlaps the first; journaled once
//!
//! let mut buffer = LogBuffer::default();
//! let mut header = durability.prep_log_buffer(&mut group, &mut buffer).unwrap();
//!
//! // the journal writer resolves the placeholder length once
//! // the total size is known
//! buffer.close_section(&mut header);
//! assert_eq!(header.section_len as usize, buffer.len());
//! ```
use std::sync::atomic::{
    AtomicU64,
    Ordering::{Acquire, Release},
};

mod buffer;
mod commit_group;
mod debug_delay;
mod error;
mod intent;
mod mapping_table;
mod optimistic_lock;
mod preplog;
mod records;

pub use buffer::LogBuffer;
pub use commit_group::{AuxOp, CommitGroup};
pub use error::{FatalError, Result};
pub use intent::WriteIntent;
pub use mapping_table::{MappedRegion, MappingTable, RelativePath, ResolvedLocation};
pub use optimistic_lock::{ExclusiveGuard, OptimisticLock, SharedGuard};
pub use records::{
    SectionHeader, ENTRY_HEADER_LEN, LOCAL_DB_BIT, MAX_FILE_OFS, PATH_CONTEXT_MARKER,
    SECTION_FOOTER_LEN, SECTION_FOOTER_SENTINEL, SECTION_HEADER_LEN, SECTION_LEN_SENTINEL,
};

pub(crate) const LOG_FILE_CLOSED: u64 = u64::MAX;

/// Counters describing journal assembly activity since this
/// [`Durability`] instance was created.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    /// Journal sections assembled.
    pub sections_assembled: u64,
    /// Basic-write entry records encoded, counting both sides
    /// of a boundary split.
    pub entries_encoded: u64,
    /// Path-context records emitted on database switches.
    pub path_context_records: u64,
    /// Writes that straddled two adjacent mappings and were
    /// split. Rare by construction.
    pub boundary_splits: u64,
    /// Total bytes appended across all assembled sections.
    pub bytes_assembled: u64,
    /// Cumulative time spent inside `prep_log_buffer`.
    pub prep_log_buffer_micros: u64,
}

#[derive(Default)]
pub(crate) struct StatsInner {
    pub(crate) sections_assembled: AtomicU64,
    pub(crate) entries_encoded: AtomicU64,
    pub(crate) path_context_records: AtomicU64,
    pub(crate) boundary_splits: AtomicU64,
    pub(crate) bytes_assembled: AtomicU64,
    pub(crate) prep_log_buffer_micros: AtomicU64,
}

/// One durability subsystem instance: owns the mapping table,
/// the current log file identity, the last data-file flush
/// sequence, and running statistics. Everything a buffer build
/// needs is reached through here rather than process-wide
/// state, so multiple independent instances can coexist in one
/// process.
pub struct Durability {
    pub(crate) views: MappingTable,
    pub(crate) local: RelativePath,
    pub(crate) log_file_id: AtomicU64,
    pub(crate) last_flush_seq: AtomicU64,
    pub(crate) stats: StatsInner,
}

impl Durability {
    /// `local` designates the database path whose entries are
    /// flagged inline rather than introduced by path-context
    /// records; [`RelativePath::local`] is the conventional
    /// choice.
    pub fn new(views: MappingTable, local: RelativePath) -> Durability {
        Durability {
            views,
            local,
            log_file_id: AtomicU64::new(LOG_FILE_CLOSED),
            last_flush_seq: AtomicU64::new(0),
            stats: StatsInner::default(),
        }
    }

    /// The address-to-backing-file table this instance resolves
    /// against. Shared lookups through it are safe while a
    /// build is in flight.
    pub fn mapping_table(&self) -> &MappingTable {
        &self.views
    }

    /// Records that the current journal log file is open under
    /// `file_id`. A precondition of building buffers.
    pub fn open_log_file(&self, file_id: u32) {
        self.log_file_id.store(u64::from(file_id), Release);
    }

    pub fn log_file_is_open(&self) -> bool {
        self.log_file_id.load(Acquire) != LOG_FILE_CLOSED
    }

    /// Records the timestamp of the last data-file flush; used
    /// as the sequence number of subsequent section headers.
    pub fn note_data_files_flushed(&self, seq: u64) {
        self.last_flush_seq.store(seq, Release);
    }

    pub fn stats(&self) -> Stats {
        Stats {
            sections_assembled: self.stats.sections_assembled.load(Acquire),
            entries_encoded: self.stats.entries_encoded.load(Acquire),
            path_context_records: self.stats.path_context_records.load(Acquire),
            boundary_splits: self.stats.boundary_splits.load(Acquire),
            bytes_assembled: self.stats.bytes_assembled.load(Acquire),
            prep_log_buffer_micros: self.stats.prep_log_buffer_micros.load(Acquire),
        }
    }
}

impl std::fmt::Debug for Durability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Durability")
            .field("views", &self.views.view_count())
            .field("log_file_open", &self.log_file_is_open())
            .field("stats", &self.stats())
            .finish()
    }
}
