//! Binary layout of the journal section. All fields are
//! little-endian. A section is:
//!
//! ```text
//! SectionHeader { section_len: u32, seq_number: u64, file_id: u32 }
//! [ PathContext { marker: u8, path_len: u32, path bytes } ]
//! Entry         { len: u32, ofs: u32, file_no: u32 } + len payload bytes
//! ...
//! SectionFooter { sentinel: u32, checksum: u32 }
//! ```
//!
//! The header is written with `section_len` set to a sentinel
//! and resolved by the caller once the total size is known,
//! which is also when the footer is appended (see
//! [`crate::LogBuffer::close_section`]). A `PathContext` only
//! precedes the first entry of a new non-local database path.

use crate::buffer::LogBuffer;
use crate::mapping_table::RelativePath;

/// Placeholder for `SectionHeader::section_len` until the
/// caller knows the total section size.
pub const SECTION_LEN_SENTINEL: u32 = 0xffff_ffff;

/// Marks the start of a `PathContext` record.
pub const PATH_CONTEXT_MARKER: u8 = 0xee;

/// Bit 31 of `Entry::file_no` flags an entry against the
/// designated local database, which never emits a path context.
pub const LOCAL_DB_BIT: u32 = 1 << 31;

/// Mapped files are bounded below this size, so any resolved
/// offset above it is a contract violation rather than data.
pub const MAX_FILE_OFS: u64 = 0x8000_0000;

pub const SECTION_HEADER_LEN: usize = 4 + 8 + 4;
pub const ENTRY_HEADER_LEN: usize = 4 + 4 + 4;
pub const SECTION_FOOTER_LEN: usize = 4 + 4;

pub const SECTION_FOOTER_SENTINEL: u32 = 0xffff_ffff;

/// The fixed-size record beginning a journal section. One per
/// buffer build, returned to the caller with `section_len`
/// still unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub section_len: u32,
    pub seq_number: u64,
    pub file_id: u32,
}

impl SectionHeader {
    pub(crate) fn unresolved(seq_number: u64, file_id: u32) -> SectionHeader {
        SectionHeader {
            section_len: SECTION_LEN_SENTINEL,
            seq_number,
            file_id,
        }
    }

    pub(crate) fn append_to(&self, buffer: &mut LogBuffer) {
        buffer.append_u32(self.section_len);
        buffer.append_u64(self.seq_number);
        buffer.append_u32(self.file_id);
    }
}

pub(crate) fn append_path_context(buffer: &mut LogBuffer, path: &RelativePath) {
    buffer.append_u8(PATH_CONTEXT_MARKER);
    buffer.append_str(path.as_str());
}

pub(crate) fn append_entry(buffer: &mut LogBuffer, len: u32, ofs: u32, file_no: u32, local: bool) {
    debug_assert_eq!(file_no & LOCAL_DB_BIT, 0, "file_no collides with local db bit");

    let file_no = if local { file_no | LOCAL_DB_BIT } else { file_no };

    buffer.append_u32(len);
    buffer.append_u32(ofs);
    buffer.append_u32(file_no);
}
