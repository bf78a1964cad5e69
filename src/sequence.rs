//! Immutable nucleotide sequences over the `ACGT` alphabet.
//!
//! A [`Sequence`] is a cheaply cloneable, shared, read-only byte buffer. Worker
//! threads receive clones of the same `Sequence` and never copy the bases.

use std::ops::Deref;
use std::sync::Arc;

/// Sentinel written for any byte that has no Watson-Crick complement
pub const SENTINEL: u8 = b'N';

/// Complement lookup for every possible byte.
///
/// `A`<->`T` and `C`<->`G`; everything else maps to [`SENTINEL`].
pub const COMPLEMENT_TABLE: [u8; 256] = {
    let mut table = [SENTINEL; 256];
    table[b'A' as usize] = b'T';
    table[b'T' as usize] = b'A';
    table[b'C' as usize] = b'G';
    table[b'G' as usize] = b'C';
    table
};

/// Returns the complement of a single base
#[inline]
#[must_use]
pub fn complement(base: u8) -> u8 {
    COMPLEMENT_TABLE[base as usize]
}

/// Writes the reverse complement of `seq` into `buf`
///
/// First clears the buffer so it can be reused across windows.
#[inline]
pub fn reverse_complement_into(seq: &[u8], buf: &mut Vec<u8>) {
    buf.clear();
    buf.extend(seq.iter().rev().map(|&b| complement(b)));
}

/// Returns the reverse complement of `seq` as a new buffer
#[must_use]
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(seq.len());
    reverse_complement_into(seq, &mut buf);
    buf
}

/// Whether `base` belongs to the uppercase `ACGT` alphabet
#[inline]
#[must_use]
pub fn is_nucleotide(base: u8) -> bool {
    matches!(base, b'A' | b'C' | b'G' | b'T')
}

/// Normalises raw text into `ibuf`
///
/// Lines starting with `>` (FASTA headers) are skipped entirely, the remaining
/// bytes are uppercased and anything outside of `ACGT` is dropped.
pub fn normalize_into(raw: &[u8], ibuf: &mut Vec<u8>) {
    ibuf.clear();
    for line in raw.split(|&b| b == b'\n') {
        if line.first() == Some(&b'>') {
            continue;
        }
        ibuf.extend(
            line.iter()
                .map(u8::to_ascii_uppercase)
                .filter(|&b| is_nucleotide(b)),
        );
    }
}

/// An immutable, shared nucleotide sequence
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    bases: Arc<[u8]>,
}

impl Sequence {
    /// Builds a sequence from raw bytes, applying [`normalize_into`]
    #[must_use]
    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut ibuf = Vec::with_capacity(raw.len());
        normalize_into(raw, &mut ibuf);
        Self::from_normalized(ibuf)
    }

    /// Wraps bytes that already satisfy the `ACGT` invariant
    pub(crate) fn from_normalized(bases: Vec<u8>) -> Self {
        debug_assert!(bases.iter().all(|&b| is_nucleotide(b)));
        Self {
            bases: Arc::from(bases),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bases
    }

    /// Returns the window `[start, start + len)` or `None` if it runs past the end
    #[inline]
    #[must_use]
    pub fn window(&self, start: usize, len: usize) -> Option<&[u8]> {
        let end = start.checked_add(len)?;
        self.bases.get(start..end)
    }

    /// Number of windows of length `len` (zero when `len` is zero or exceeds the sequence)
    #[inline]
    #[must_use]
    pub fn num_windows(&self, len: usize) -> usize {
        if len == 0 || len > self.len() {
            0
        } else {
            self.len() - len + 1
        }
    }

    /// Returns the reverse complement of the whole sequence
    #[must_use]
    pub fn reverse_complement(&self) -> Self {
        Self::from_normalized(reverse_complement(&self.bases))
    }

    /// Midpoint offset, the default focus of the region-limiting heuristic
    #[must_use]
    pub fn midpoint(&self) -> usize {
        self.len() / 2
    }
}

impl Deref for Sequence {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.bases
    }
}

impl AsRef<[u8]> for Sequence {
    fn as_ref(&self) -> &[u8] {
        &self.bases
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const PREVIEW: usize = 32;
        let shown = &self.bases[..self.len().min(PREVIEW)];
        let ellipsis = if self.len() > PREVIEW { "..." } else { "" };
        write!(
            f,
            "Sequence({}{}, len={})",
            String::from_utf8_lossy(shown),
            ellipsis,
            self.len()
        )
    }
}
