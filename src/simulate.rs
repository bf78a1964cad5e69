//! Seeded generation of sequence pairs with known repeats.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::ops::RangeInclusive;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{InputError, Result};
use crate::repeat::RepeatPattern;
use crate::sequence::{reverse_complement, Sequence};

/// Line width of generated FASTA files
pub const FASTA_LINE_WIDTH: usize = 80;

/// Default seed
pub const DEFAULT_SEED: u64 = 42;

/// A feature planted by the [`Simulator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantedRepeat {
    /// Start of the planted block in the reference
    pub reference_position: usize,
    /// Start of the single copy of `unit` in the query
    pub query_position: usize,
    /// The repeated unit as it appears in the query
    pub unit: String,
    /// Number of back-to-back copies in the reference
    pub copies: usize,
    /// Whether the reference holds the reverse complement of `unit`
    pub is_reverse: bool,
}

impl PlantedRepeat {
    /// Whether `repeat` reports this feature: same start and orientation,
    /// covering the whole unit and every planted copy
    #[must_use]
    pub fn is_detected_by(&self, repeat: &RepeatPattern) -> bool {
        repeat.reference_position == self.reference_position
            && repeat.is_reverse == self.is_reverse
            && repeat.length >= self.unit.len()
            && repeat.repeat_count >= self.copies
    }
}

/// A generated query/reference pair together with its planted features
#[derive(Debug, Clone)]
pub struct SimulatedPair {
    pub reference: Sequence,
    pub query: Sequence,
    pub planted: Vec<PlantedRepeat>,
}

/// Generates random `ACGT` sequences with tandem and reverse-complement repeats
///
/// Every planted feature gets its own slot of both sequences so features never
/// overlap. Even-numbered features are forward tandem blocks of 2 to
/// `max_copies` copies, odd-numbered features are single reverse-complement
/// copies.
#[derive(Debug, Clone)]
pub struct Simulator {
    rng: SmallRng,
    reference_length: usize,
    query_length: usize,
    num_repeats: usize,
    unit_lengths: RangeInclusive<usize>,
    max_copies: usize,
}

impl Simulator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            reference_length: 10_000,
            query_length: 10_000,
            num_repeats: 10,
            unit_lengths: 10..=40,
            max_copies: 4,
        }
    }

    #[must_use]
    pub fn reference_length(mut self, length: usize) -> Self {
        self.reference_length = length;
        self
    }

    #[must_use]
    pub fn query_length(mut self, length: usize) -> Self {
        self.query_length = length;
        self
    }

    #[must_use]
    pub fn repeats(mut self, num_repeats: usize) -> Self {
        self.num_repeats = num_repeats;
        self
    }

    #[must_use]
    pub fn unit_lengths(mut self, min: usize, max: usize) -> Self {
        let min = min.max(1);
        self.unit_lengths = min..=max.max(min);
        self
    }

    #[must_use]
    pub fn max_copies(mut self, copies: usize) -> Self {
        self.max_copies = copies.max(2);
        self
    }

    fn random_bases(&mut self, len: usize) -> Vec<u8> {
        (0..len)
            .map(|_| b"ACGT"[self.rng.random_range(0..4)])
            .collect()
    }

    /// Largest number of features that fit both sequences
    fn capacity(&self) -> usize {
        let max_unit = *self.unit_lengths.end();
        let reference_slot = max_unit * self.max_copies + 1;
        let query_slot = max_unit + 1;
        (self.reference_length / reference_slot).min(self.query_length / query_slot)
    }

    /// Generates the next pair
    pub fn generate(&mut self) -> SimulatedPair {
        let num_repeats = self.num_repeats.min(self.capacity());
        if num_repeats < self.num_repeats {
            log::warn!(
                "only {num_repeats} of {} repeats fit the requested sequence lengths",
                self.num_repeats
            );
        }

        let mut reference = self.random_bases(self.reference_length);
        let mut query = self.random_bases(self.query_length);
        let mut planted = Vec::with_capacity(num_repeats);
        if num_repeats == 0 {
            return SimulatedPair {
                reference: Sequence::from_normalized(reference),
                query: Sequence::from_normalized(query),
                planted,
            };
        }

        let reference_slot = self.reference_length / num_repeats;
        let query_slot = self.query_length / num_repeats;
        for k in 0..num_repeats {
            let unit_len = self.rng.random_range(self.unit_lengths.clone());
            let unit = self.random_bases(unit_len);
            let is_reverse = k % 2 == 1;
            let copies = if is_reverse {
                1
            } else {
                self.rng.random_range(2..=self.max_copies)
            };

            let block = if is_reverse {
                reverse_complement(&unit)
            } else {
                unit.repeat(copies)
            };
            let reference_position =
                k * reference_slot + self.rng.random_range(0..=reference_slot - block.len());
            let query_position = k * query_slot + self.rng.random_range(0..=query_slot - unit_len);

            reference[reference_position..reference_position + block.len()]
                .copy_from_slice(&block);
            query[query_position..query_position + unit_len].copy_from_slice(&unit);

            planted.push(PlantedRepeat {
                reference_position,
                query_position,
                unit: String::from_utf8_lossy(&unit).into_owned(),
                copies,
                is_reverse,
            });
        }

        SimulatedPair {
            reference: Sequence::from_normalized(reference),
            query: Sequence::from_normalized(query),
            planted,
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

/// Writes `sequence` as a single FASTA record wrapped at [`FASTA_LINE_WIDTH`]
pub fn write_fasta<W: Write>(mut writer: W, header: &str, sequence: &[u8]) -> Result<()> {
    writeln!(writer, ">{header}")?;
    for line in sequence.chunks(FASTA_LINE_WIDTH) {
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the planted features as CSV
pub fn write_planted<W: Write>(mut writer: W, planted: &[PlantedRepeat]) -> Result<()> {
    writeln!(
        writer,
        "reference_position,query_position,length,copies,is_reverse,unit"
    )?;
    let mut ibuf = itoa::Buffer::new();
    for p in planted {
        writer.write_all(ibuf.format(p.reference_position).as_bytes())?;
        writer.write_all(b",")?;
        writer.write_all(ibuf.format(p.query_position).as_bytes())?;
        writer.write_all(b",")?;
        writer.write_all(ibuf.format(p.unit.len()).as_bytes())?;
        writer.write_all(b",")?;
        writer.write_all(ibuf.format(p.copies).as_bytes())?;
        writer.write_all(b",")?;
        writer.write_all(if p.is_reverse { b"yes" } else { b"no" })?;
        writer.write_all(b",")?;
        writer.write_all(p.unit.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads an answer key in the format of [`write_planted`]
pub fn read_planted<R: BufRead>(reader: R) -> Result<Vec<PlantedRepeat>> {
    let mut planted = Vec::new();
    for (idx, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        planted.push(parse_planted_row(&line, idx + 1)?);
    }
    Ok(planted)
}

fn parse_planted_row(line: &str, line_number: usize) -> Result<PlantedRepeat> {
    let invalid = |detail: String| InputError::InvalidAnswerKey {
        line: line_number,
        detail,
    };
    let fields: Vec<&str> = line.trim_end().split(',').collect();
    let &[reference_position, query_position, length, copies, is_reverse, unit] = fields.as_slice() else {
        return Err(invalid(format!("expected 6 fields, found {}", fields.len())).into());
    };
    let number = |name: &str, value: &str| {
        value
            .parse::<usize>()
            .map_err(|e| invalid(format!("{name} `{value}`: {e}")))
    };
    let is_reverse = match is_reverse {
        "yes" => true,
        "no" => false,
        other => return Err(invalid(format!("is_reverse must be yes or no, got `{other}`")).into()),
    };
    if number("length", length)? != unit.len() {
        return Err(invalid(format!("length {length} does not match unit `{unit}`")).into());
    }
    Ok(PlantedRepeat {
        reference_position: number("reference_position", reference_position)?,
        query_position: number("query_position", query_position)?,
        unit: unit.to_string(),
        copies: number("copies", copies)?,
        is_reverse,
    })
}

/// Reads the answer key at `path`
pub fn parse_planted<P: AsRef<Path>>(path: P) -> Result<Vec<PlantedRepeat>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| InputError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    read_planted(BufReader::new(file))
}

/// How well a search recovered the planted features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub planted: usize,
    pub detected: usize,
    pub reported: usize,
}

impl Evaluation {
    /// Fraction of planted features that were detected (1.0 when nothing was planted)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn detection_rate(&self) -> f64 {
        if self.planted == 0 {
            1.0
        } else {
            self.detected as f64 / self.planted as f64
        }
    }
}

/// Scores `repeats` against the answer key
#[must_use]
pub fn evaluate(planted: &[PlantedRepeat], repeats: &[RepeatPattern]) -> Evaluation {
    let detected = planted
        .iter()
        .filter(|p| repeats.iter().any(|r| p.is_detected_by(r)))
        .count();
    Evaluation {
        planted: planted.len(),
        detected,
        reported: repeats.len(),
    }
}

/// Writes `reference.txt`, `query.txt` and `planted.csv` into `dir`
pub fn write_pair(dir: &Path, pair: &SimulatedPair) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    write_fasta(
        BufWriter::new(File::create(dir.join("reference.txt"))?),
        "reference",
        pair.reference.as_bytes(),
    )?;
    write_fasta(
        BufWriter::new(File::create(dir.join("query.txt"))?),
        "query",
        pair.query.as_bytes(),
    )?;
    write_planted(
        BufWriter::new(File::create(dir.join("planted.csv"))?),
        &pair.planted,
    )?;
    log::info!(
        "wrote {} bp reference, {} bp query and {} planted repeats to {}",
        pair.reference.len(),
        pair.query.len(),
        pair.planted.len(),
        dir.display()
    );
    Ok(())
}
