//! Loading sequences from plain-text or FASTA files.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{InputError, Result, SearchError};
use crate::sequence::{normalize_into, Sequence};

/// Reads a sequence file into memory
///
/// The file is memory mapped and normalised: FASTA header lines are skipped,
/// bases are uppercased and every byte outside of `ACGT` is removed. Multiple
/// records are concatenated.
pub fn read_sequence<P: AsRef<Path>>(path: P) -> Result<Sequence> {
    let path = path.as_ref();
    let unreadable = |source| InputError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unreadable)?;
    let metadata = file.metadata().map_err(unreadable)?;

    // Verify it's a regular file before attempting to map
    if !metadata.is_file() {
        return Err(InputError::IncompatibleFile(path.to_path_buf()).into());
    }

    // zero-length files cannot be mapped on every platform
    if metadata.len() == 0 {
        return Err(InputError::EmptySequence(path.display().to_string()).into());
    }

    // Safety: The file is open and won't be modified while mapped
    let mmap = unsafe { Mmap::map(&file).map_err(unreadable)? };

    let mut ibuf = Vec::new();
    ibuf.try_reserve(mmap.len())
        .map_err(|_| SearchError::allocation("sequence buffer", mmap.len()))?;
    normalize_into(&mmap, &mut ibuf);

    if ibuf.is_empty() {
        return Err(InputError::EmptySequence(path.display().to_string()).into());
    }
    log::debug!(
        "loaded {} bases from {} ({} bytes)",
        ibuf.len(),
        path.display(),
        mmap.len()
    );
    Ok(Sequence::from_normalized(ibuf))
}

/// Reads the reference and query files of a search
pub fn read_pair<P: AsRef<Path>, Q: AsRef<Path>>(
    reference: P,
    query: Q,
) -> Result<(Sequence, Sequence)> {
    Ok((read_sequence(reference)?, read_sequence(query)?))
}
