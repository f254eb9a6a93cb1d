use crate::error::{FatalError, Result};

/// A pending in-memory write captured during the commit
/// interval: a start address and a byte length. Transient;
/// consumed and discarded once encoded into the journal
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WriteIntent {
    start: u64,
    length: u32,
}

impl WriteIntent {
    pub fn new(start: u64, length: u32) -> WriteIntent {
        WriteIntent { start, length }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// One past the last address covered.
    pub fn end(&self) -> u64 {
        self.start + u64::from(self.length)
    }

    /// Widens this intent to the union of itself and `other`.
    /// Only valid when the two overlap, i.e. `other.start <=
    /// self.end()`.
    pub(crate) fn absorb(&mut self, other: WriteIntent) {
        debug_assert!(
            other.start <= self.end(),
            "absorb called on non-overlapping intents"
        );
        debug_assert!(self.start <= other.start);

        let end = self.end().max(other.end());
        debug_assert!(
            end - self.start <= u64::from(u32::MAX),
            "merged intent length exceeds the mapped-file size ceiling"
        );
        self.length = (end - self.start) as u32;
    }
}

/// Merges a start-sorted sequence of intents into the minimal
/// disjoint sequence covering the same bytes.
///
/// If we have two writes to the same location during the group
/// commit interval, they are journaled here once. Adjacent but
/// non-overlapping intents are kept separate (strict `<` on the
/// accumulator's end).
///
/// An empty input is a caller contract violation: the commit
/// exclusion must have been held and at least one write
/// recorded before a buffer build starts. Sort order is an
/// upstream contract (`CommitGroup::sorted_intents`), checked
/// here only in debug builds.
pub(crate) fn coalesce(sorted: &[WriteIntent]) -> Result<Vec<WriteIntent>> {
    if sorted.is_empty() {
        return Err(FatalError::Precondition(
            "coalesce called with no write intents",
        ));
    }

    let mut out = Vec::with_capacity(sorted.len());
    let mut last = sorted[0];

    for intent in &sorted[1..] {
        debug_assert!(
            last.start() <= intent.start(),
            "write intents must be start-sorted"
        );

        if intent.start() < last.end() {
            // overlaps
            last.absorb(*intent);
        } else {
            // discontinuous
            out.push(last);
            last = *intent;
        }
    }
    out.push(last);

    Ok(out)
}
