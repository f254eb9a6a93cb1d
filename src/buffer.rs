use crate::records::{SectionHeader, SECTION_FOOTER_LEN, SECTION_FOOTER_SENTINEL};

/// Append-only byte builder that one journal section is
/// assembled into. The buffer is reset at the start of every
/// build and handed to the journal writer whole; nothing in
/// the assembly path ever reads it back or rewinds it, except
/// for the single length fixup performed by
/// [`LogBuffer::close_section`].
#[derive(Default, Debug)]
pub struct LogBuffer {
    buf: Vec<u8>,
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> LogBuffer {
        LogBuffer {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Clears contents while keeping the allocation for the
    /// next group commit.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn append_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn append_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn append_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Appends a `u32` length prefix followed by the string
    /// bytes.
    pub fn append_str(&mut self, s: &str) {
        self.append_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Resolves the placeholder section length at the front of
    /// the buffer and appends the checksummed footer. Called by
    /// the journal writer once the section is complete; the
    /// assembly path itself leaves the length unresolved.
    ///
    /// The section length covers header, body, and footer. The
    /// checksum covers everything before the footer, with the
    /// length field already resolved.
    pub fn close_section(&mut self, header: &mut SectionHeader) {
        assert!(
            self.buf.len() >= 4,
            "close_section called on a buffer without a section header"
        );

        let section_len = (self.buf.len() + SECTION_FOOTER_LEN) as u32;
        self.buf[0..4].copy_from_slice(&section_len.to_le_bytes());
        header.section_len = section_len;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.buf);
        let checksum = hasher.finalize();

        self.append_u32(SECTION_FOOTER_SENTINEL);
        self.append_u32(checksum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SECTION_LEN_SENTINEL;

    #[test]
    fn close_section_resolves_length_and_checksums() {
        let mut buffer = LogBuffer::default();
        let mut header = SectionHeader::unresolved(7, 3);
        header.append_to(&mut buffer);
        buffer.append_bytes(b"some section body");

        let body_len = buffer.len();
        buffer.close_section(&mut header);

        assert_eq!(header.section_len as usize, buffer.len());
        assert_eq!(buffer.len(), body_len + SECTION_FOOTER_LEN);

        let bytes = buffer.as_slice();
        let stored_len = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_ne!(stored_len, SECTION_LEN_SENTINEL);
        assert_eq!(stored_len, header.section_len);

        // the checksum covers everything before the footer
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&bytes[..body_len]);
        let expected = hasher.finalize();
        let stored = u32::from_le_bytes(bytes[body_len + 4..].try_into().unwrap());
        assert_eq!(stored, expected);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut buffer = LogBuffer::with_capacity(1024);
        buffer.append_bytes(&[1, 2, 3]);
        buffer.reset();
        assert!(buffer.is_empty());
    }
}
