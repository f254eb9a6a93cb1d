//! The journal buffer assembly path. One call to
//! [`Durability::prep_log_buffer`] builds a complete section
//! for a group commit: placeholder header, auxiliary operation
//! records, then the coalesced basic-write records.

use std::sync::atomic::Ordering::{Acquire, Relaxed};
use std::time::Instant;

use crate::buffer::LogBuffer;
use crate::commit_group::CommitGroup;
use crate::error::{FatalError, Result};
use crate::intent::{coalesce, WriteIntent};
use crate::mapping_table::RelativePath;
use crate::records::{self, SectionHeader, MAX_FILE_OFS};
use crate::{Durability, LOG_FILE_CLOSED};

pub(crate) fn reset_log_buffer(buffer: &mut LogBuffer, seq_number: u64, file_id: u32) -> SectionHeader {
    buffer.reset();

    // total length will be filled in by the caller later
    let header = SectionHeader::unresolved(seq_number, file_id);
    header.append_to(buffer);
    header
}

impl Durability {
    /// Puts one coalesced basic write into the buffer to be
    /// journaled.
    ///
    /// A write only needs splitting when it runs to the last
    /// byte of one mapped file and continues into a neighbor
    /// that happens to be mapped adjacently. Most OSs leave at
    /// least a one page gap between mappings, but better to be
    /// safe. The split runs as a loop over the remainder so
    /// stack use stays flat and termination is the explicit
    /// `remaining == 0` condition.
    fn prep_basic_write(
        &self,
        buffer: &mut LogBuffer,
        intent: &WriteIntent,
        last_db_path: &mut Option<RelativePath>,
    ) -> Result<()> {
        let mut start = intent.start();
        let mut remaining = u64::from(intent.length());

        while remaining > 0 {
            let resolved = match self.views.resolve(start) {
                Some(resolved) => resolved,
                None => {
                    return Err(FatalError::unresolved(start, self.views.view_count()));
                }
            };

            // tag this view as needing a remap of its private
            // mapping later; usually already tagged
            resolved.note_will_need_remap();

            if resolved.ofs() > MAX_FILE_OFS {
                return Err(FatalError::Precondition(
                    "resolved file offset exceeds the mapped file size ceiling",
                ));
            }

            // don't write past the end of the backing file
            let len = remaining.min(resolved.remaining());

            let path = resolved.relative_path();
            let local = path == &self.local;
            if !local && last_db_path.as_ref() != Some(path) {
                // entries switched to a different database;
                // journal a path context. Switches are rare
                // since intents are sorted by address.
                *last_db_path = Some(path.clone());
                records::append_path_context(buffer, path);
                self.stats.path_context_records.fetch_add(1, Relaxed);
            }

            log::trace!(
                "journaling {} bytes of file {} at offset {}",
                len,
                resolved.file_no(),
                resolved.ofs(),
            );

            records::append_entry(buffer, len as u32, resolved.ofs() as u32, resolved.file_no(), local);
            buffer.append_bytes(resolved.view_bytes(len as usize));
            self.stats.entries_encoded.fetch_add(1, Relaxed);

            if len != remaining {
                log::info!(
                    "journal splitting basic write at mapping boundary at {:#x}",
                    start + len,
                );
                self.stats.boundary_splits.fetch_add(1, Relaxed);
            }

            start += len;
            remaining -= len;
        }

        Ok(())
    }

    /// Basic write ops / write intents. If we have two writes
    /// to the same location during the group commit interval,
    /// they are journaled here once.
    fn prep_basic_writes(&self, buffer: &mut LogBuffer, group: &mut CommitGroup) -> Result<()> {
        let merged = coalesce(group.sorted_intents())?;

        let mut last_db_path: Option<RelativePath> = None;
        for intent in &merged {
            self.prep_basic_write(buffer, intent, &mut last_db_path)?;
        }

        Ok(())
    }

    /// Builds one complete journal section for a commit group
    /// into `buffer`.
    ///
    /// The `&mut CommitGroup` borrow stands in for the
    /// commit-exclusion lock: the intent set cannot change for
    /// the duration of the build. The current log file must be
    /// open and the group non-empty.
    ///
    /// Returns the section header with its length field still
    /// unresolved; the caller fills it in (see
    /// [`LogBuffer::close_section`]) once the total size is
    /// known.
    pub fn prep_log_buffer(
        &self,
        group: &mut CommitGroup,
        buffer: &mut LogBuffer,
    ) -> Result<SectionHeader> {
        let before = Instant::now();

        if group.is_empty() {
            // did you forget to record writes before committing?
            return Err(FatalError::Precondition(
                "prep_log_buffer called with no write intents",
            ));
        }

        let raw_file_id = self.log_file_id.load(Acquire);
        if raw_file_id == LOG_FILE_CLOSED {
            return Err(FatalError::Precondition(
                "prep_log_buffer called without an open log file",
            ));
        }

        let header = reset_log_buffer(
            buffer,
            self.last_flush_seq.load(Acquire),
            raw_file_id as u32,
        );

        // ops other than basic writes, in registration order
        for op in group.ops() {
            op.serialize_into(buffer);
        }

        self.prep_basic_writes(buffer, group)?;

        log::debug!(
            "assembled journal section of {} bytes from {} intents",
            buffer.len(),
            group.intent_count(),
        );

        self.stats.sections_assembled.fetch_add(1, Relaxed);
        self.stats
            .bytes_assembled
            .fetch_add(buffer.len() as u64, Relaxed);
        self.stats
            .prep_log_buffer_micros
            .fetch_add(before.elapsed().as_micros() as u64, Relaxed);

        Ok(header)
    }
}
