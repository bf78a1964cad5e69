use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::repeat::{IndexSide, RepeatPattern};

/// Column header of the CSV table
pub const CSV_HEADER: &str =
    "position,length,repeat_count,is_reverse,original_sequence,query_position";

/// Which reference coordinate is reported for a repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionStyle {
    /// 0-based start of the repeat
    #[default]
    Start,
    /// `position + length`, the end coordinate used by older reports
    End,
}

impl PositionStyle {
    #[must_use]
    pub fn position(self, repeat: &RepeatPattern) -> usize {
        match self {
            Self::Start => repeat.reference_position,
            Self::End => repeat.end_position(),
        }
    }
}

/// Output layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One CSV row per repeat, preceded by [`CSV_HEADER`]
    #[default]
    Csv,
    /// One `Repeat #n:` block per repeat
    Details,
}

/// Writes ranked repeats as CSV rows or as a detailed report
pub struct ResultWriter<W: Write> {
    /// Inner writer
    inner: W,

    format: OutputFormat,
    position_style: PositionStyle,

    /// Reusable integer formatting buffer
    ibuf: itoa::Buffer,

    /// Number of repeats written
    records_written: usize,
}

impl<W: Write> ResultWriter<W> {
    /// Creates a CSV writer and writes the header row
    pub fn new(inner: W) -> Result<Self> {
        ResultWriterBuilder::default().build(inner)
    }

    /// Writes a single repeat
    pub fn write_repeat(&mut self, repeat: &RepeatPattern) -> Result<()> {
        self.records_written += 1;
        match self.format {
            OutputFormat::Csv => self.write_row(repeat),
            OutputFormat::Details => self.write_block(repeat),
        }
    }

    /// Writes every repeat in order
    pub fn write_all(&mut self, repeats: &[RepeatPattern]) -> Result<()> {
        repeats.iter().try_for_each(|r| self.write_repeat(r))
    }

    fn write_row(&mut self, repeat: &RepeatPattern) -> Result<()> {
        let position = self.position_style.position(repeat);
        let w = &mut self.inner;
        w.write_all(self.ibuf.format(position).as_bytes())?;
        w.write_all(b",")?;
        w.write_all(self.ibuf.format(repeat.length).as_bytes())?;
        w.write_all(b",")?;
        w.write_all(self.ibuf.format(repeat.repeat_count).as_bytes())?;
        w.write_all(b",")?;
        w.write_all(repeat.orientation_label().as_bytes())?;
        w.write_all(b",")?;
        w.write_all(repeat.original_sequence.as_bytes())?;
        w.write_all(b",")?;
        w.write_all(self.ibuf.format(repeat.query_position).as_bytes())?;
        w.write_all(b"\n")?;
        Ok(())
    }

    fn write_block(&mut self, repeat: &RepeatPattern) -> Result<()> {
        let position = self.position_style.position(repeat);
        writeln!(self.inner, "Repeat #{}:", self.records_written)?;
        writeln!(self.inner, "  Position: {position}")?;
        writeln!(self.inner, "  Length: {}", repeat.length)?;
        writeln!(self.inner, "  Repeat count: {}", repeat.repeat_count)?;
        writeln!(self.inner, "  Reverse complement: {}", repeat.orientation_label())?;
        writeln!(self.inner, "  Sequence: {}", repeat.original_sequence)?;
        writeln!(self.inner, "  Query position: {}", repeat.query_position)?;
        let label = match repeat.occurrences_in {
            IndexSide::Reference => "reference",
            IndexSide::Query | IndexSide::Both => "query",
        };
        write!(self.inner, "  Occurrences in {label}:")?;
        for (i, position) in repeat.occurrences().enumerate() {
            self.inner.write_all(if i == 0 { b" " } else { b", " })?;
            self.inner.write_all(self.ibuf.format(position).as_bytes())?;
        }
        writeln!(self.inner)?;
        writeln!(self.inner)?;
        Ok(())
    }

    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Builder for [`ResultWriter`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultWriterBuilder {
    format: Option<OutputFormat>,
    position_style: Option<PositionStyle>,
}

impl ResultWriterBuilder {
    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn position_style(mut self, style: PositionStyle) -> Self {
        self.position_style = Some(style);
        self
    }

    /// Builds the writer; CSV output gets its header row immediately
    pub fn build<W: Write>(self, mut inner: W) -> Result<ResultWriter<W>> {
        let format = self.format.unwrap_or_default();
        if format == OutputFormat::Csv {
            writeln!(inner, "{CSV_HEADER}")?;
        }
        Ok(ResultWriter {
            inner,
            format,
            position_style: self.position_style.unwrap_or_default(),
            ibuf: itoa::Buffer::new(),
            records_written: 0,
        })
    }
}

/// Paths written by [`write_reports`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub details: PathBuf,
}

impl ReportPaths {
    /// `<prefix>.csv` and `<prefix>.details.txt`
    #[must_use]
    pub fn from_prefix(prefix: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = prefix.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            csv: with_suffix(".csv"),
            details: with_suffix(".details.txt"),
        }
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Writes the CSV table and the detailed report next to `prefix`
pub fn write_reports(
    prefix: &Path,
    repeats: &[RepeatPattern],
    position_style: PositionStyle,
) -> Result<ReportPaths> {
    let paths = ReportPaths::from_prefix(prefix);
    for (path, format) in [
        (&paths.csv, OutputFormat::Csv),
        (&paths.details, OutputFormat::Details),
    ] {
        let mut writer = ResultWriterBuilder::default()
            .format(format)
            .position_style(position_style)
            .build(create(path)?)?;
        writer.write_all(repeats)?;
        writer.flush()?;
        log::info!("wrote {} repeats to {}", writer.records_written(), path.display());
    }
    Ok(paths)
}
