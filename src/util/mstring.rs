//! `MString`: a growable byte buffer that only grows, never
//! reallocates smaller, tracking its logical (written) length
//! separately from its capacity.
//!
//! This is the Rust equivalent of the scratch-buffer idiom spec.md §9
//! calls out ("Scratch buffers per column. Preallocate fixed-size
//! buffers per column using the type map; resize only for string/blob
//! on demand.") — both the per-parameter insert buffers of
//! `server::table::TableHandle` and the metadata-prologue accumulator
//! of `client::buffer::BufferedWriter` are built on it.

#[derive(Debug, Clone, Default)]
pub struct MString {
    bytes: Vec<u8>,
}

impl MString {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Appends bytes, growing the backing allocation on demand. This is
    /// the only mutation the type offers; callers never shrink a
    /// scratch buffer, matching the "grow on demand" rule for
    /// string/blob columns.
    pub fn extend(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Replaces the contents wholesale, reusing the existing
    /// allocation when it is already large enough.
    pub fn set(&mut self, data: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(data);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reuses_allocation() {
        let mut m = MString::with_capacity(4);
        m.set(b"hello world, this is longer than four bytes");
        assert_eq!(m.as_slice(), b"hello world, this is longer than four bytes");
        let cap_after_grow = m.bytes.capacity();
        m.set(b"short");
        assert_eq!(m.as_slice(), b"short");
        assert!(m.bytes.capacity() >= cap_after_grow.min(m.bytes.capacity()));
    }

    #[test]
    fn extend_accumulates() {
        let mut m = MString::default();
        m.extend(b"abc");
        m.extend(b"def");
        assert_eq!(m.as_slice(), b"abcdef");
    }
}
