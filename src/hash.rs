//! Window hashing.
//!
//! Two schemes are provided:
//!
//! * [`PolynomialHasher`]: a Rabin-Karp style rolling hash used for exact matching.
//! * [`KmerXorHasher`]: XOR-folds the hashes of every k-mer in the window, used when
//!   the similarity threshold is below 1.0.
//!
//! Both compute every window hash of a sequence in a single linear pass. Hash
//! equality is only ever a bucket selector; callers must still compare content.

use crate::error::{Result, SearchError};

/// Default prime multiplier of the polynomial hash
pub const DEFAULT_PRIME: u64 = 31;
/// Default modulus of the polynomial hash (2^31 - 1)
pub const DEFAULT_MODULUS: u64 = (1 << 31) - 1;
/// Default k-mer size for the fuzzy hash
pub const DEFAULT_KMER_SIZE: usize = 3;

const DJB2_SEED: u64 = 5381;

/// Trait for hashing fixed-length windows of a nucleotide sequence
pub trait WindowHasher: Send + Sync {
    /// Hashes a single window
    fn hash_window(&self, window: &[u8]) -> u64;

    /// Appends the hash of every window of length `len` in `seq` to `out`
    ///
    /// `out[i]` is the hash of `seq[i..i + len]`. Nothing is written if
    /// `len` is zero or larger than the sequence.
    fn window_hashes(&self, seq: &[u8], len: usize, out: &mut Vec<u64>) -> Result<()>;
}

/// Reserves room for `n` hashes, surfacing allocation failure as an error
fn reserve_hashes(out: &mut Vec<u64>, n: usize) -> Result<()> {
    out.try_reserve(n)
        .map_err(|_| SearchError::allocation("window hashes", n))?;
    Ok(())
}

fn num_windows(seq_len: usize, len: usize) -> usize {
    if len == 0 || len > seq_len {
        0
    } else {
        seq_len - len + 1
    }
}

/// Polynomial rolling hash over the nucleotide alphabet
#[derive(Debug, Clone, Copy)]
pub struct PolynomialHasher {
    prime: u64,
    modulus: u64,
}

impl Default for PolynomialHasher {
    fn default() -> Self {
        Self::new(DEFAULT_PRIME, DEFAULT_MODULUS)
    }
}

impl PolynomialHasher {
    /// Creates a hasher with the given multiplier and modulus
    ///
    /// The modulus must fit in 31 bits so intermediate products never overflow.
    #[must_use]
    pub fn new(prime: u64, modulus: u64) -> Self {
        debug_assert!(modulus > 0 && modulus <= DEFAULT_MODULUS);
        Self {
            prime: prime % modulus,
            modulus,
        }
    }

    /// Symbol weights; bases outside of `ACGT` contribute zero.
    #[inline]
    fn symbol(base: u8) -> u64 {
        match base {
            b'A' => 3,
            b'C' => 5,
            b'G' => 7,
            b'T' => 11,
            _ => 0,
        }
    }

    /// `prime^exp mod modulus`
    fn power(&self, exp: usize) -> u64 {
        (0..exp).fold(1, |acc, _| acc * self.prime % self.modulus)
    }
}

impl WindowHasher for PolynomialHasher {
    fn hash_window(&self, window: &[u8]) -> u64 {
        window.iter().fold(0, |h, &b| {
            (h * self.prime + Self::symbol(b)) % self.modulus
        })
    }

    fn window_hashes(&self, seq: &[u8], len: usize, out: &mut Vec<u64>) -> Result<()> {
        let n = num_windows(seq.len(), len);
        if n == 0 {
            return Ok(());
        }
        reserve_hashes(out, n)?;

        let lead = self.power(len - 1);
        let mut h = self.hash_window(&seq[..len]);
        out.push(h);
        for i in len..seq.len() {
            let outgoing = Self::symbol(seq[i - len]) * lead % self.modulus;
            h = (h + self.modulus - outgoing) % self.modulus;
            h = (h * self.prime + Self::symbol(seq[i])) % self.modulus;
            out.push(h);
        }
        Ok(())
    }
}

/// XOR-folded k-mer hash for similarity matching
///
/// Each k-mer is hashed with a djb2-style recurrence and the window hash is the
/// XOR of all its k-mer hashes. Windows shorter than `k` are hashed as a single
/// k-mer.
#[derive(Debug, Clone, Copy)]
pub struct KmerXorHasher {
    k: usize,
}

impl Default for KmerXorHasher {
    fn default() -> Self {
        Self::new(DEFAULT_KMER_SIZE)
    }
}

impl KmerXorHasher {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1) }
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    fn kmer_hash(kmer: &[u8]) -> u64 {
        kmer.iter().fold(0u64, |h, &b| {
            (h << 5).wrapping_add(h).wrapping_add(u64::from(b))
        })
    }
}

impl WindowHasher for KmerXorHasher {
    fn hash_window(&self, window: &[u8]) -> u64 {
        if window.len() < self.k {
            return DJB2_SEED ^ Self::kmer_hash(window);
        }
        window
            .windows(self.k)
            .fold(DJB2_SEED, |h, kmer| h ^ Self::kmer_hash(kmer))
    }

    fn window_hashes(&self, seq: &[u8], len: usize, out: &mut Vec<u64>) -> Result<()> {
        let n = num_windows(seq.len(), len);
        if n == 0 {
            return Ok(());
        }
        reserve_hashes(out, n)?;

        if len < self.k {
            out.extend(seq.windows(len).map(|w| self.hash_window(w)));
            return Ok(());
        }

        // slide over the (len - k + 1) k-mers of each window, swapping one k-mer per step
        let k = self.k;
        let span = len - k + 1;
        let kmer_at = |i: usize| Self::kmer_hash(&seq[i..i + k]);
        let mut h = (0..span).fold(DJB2_SEED, |h, i| h ^ kmer_at(i));
        out.push(h);
        for i in 1..n {
            h ^= kmer_at(i - 1) ^ kmer_at(i + span - 1);
            out.push(h);
        }
        Ok(())
    }
}

/// The hashing scheme selected for a search
#[derive(Debug, Clone, Copy)]
pub enum HashScheme {
    Exact(PolynomialHasher),
    Fuzzy(KmerXorHasher),
}

impl HashScheme {
    /// Picks the exact scheme for a threshold of 1.0 and the fuzzy scheme otherwise
    #[must_use]
    pub fn for_threshold(similarity_threshold: f64, kmer_size: usize) -> Self {
        if similarity_threshold >= 1.0 {
            Self::Exact(PolynomialHasher::default())
        } else {
            Self::Fuzzy(KmerXorHasher::new(kmer_size))
        }
    }

    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

impl WindowHasher for HashScheme {
    fn hash_window(&self, window: &[u8]) -> u64 {
        match self {
            Self::Exact(h) => h.hash_window(window),
            Self::Fuzzy(h) => h.hash_window(window),
        }
    }

    fn window_hashes(&self, seq: &[u8], len: usize, out: &mut Vec<u64>) -> Result<()> {
        match self {
            Self::Exact(h) => h.window_hashes(seq, len, out),
            Self::Fuzzy(h) => h.window_hashes(seq, len, out),
        }
    }
}
