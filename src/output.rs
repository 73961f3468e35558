// Result writers
//
// Rows are written as comma-separated text, one per line, no header:
//   4-column: timestamp,ground_truth,estimated,error
//   5-column: timestamp,ground_truth,noisy,estimated,error
// where error = ground_truth - estimated.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One aligned result row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateRow {
    pub timestamp: f64,
    pub ground_truth: f64,
    /// Measurement fed to the filter, when it was synthesized from the truth
    pub noisy: Option<f64>,
    pub estimate: f64,
}

impl EstimateRow {
    pub fn error(&self) -> f64 {
        self.ground_truth - self.estimate
    }
}

/// Column layout of the output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// timestamp, ground truth, estimate, error
    FourColumn,
    /// timestamp, ground truth, noisy measurement, estimate, error
    FiveColumn,
}

/// Trait for output handlers
pub trait OutputHandler {
    /// Handle one result row
    fn handle_row(&mut self, row: &EstimateRow) -> Result<()>;

    /// Flush anything buffered
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects rows in memory
impl OutputHandler for Vec<EstimateRow> {
    fn handle_row(&mut self, row: &EstimateRow) -> Result<()> {
        self.push(*row);
        Ok(())
    }
}

/// CSV format output
pub struct CsvOutput<W: Write> {
    writer: W,
    format: OutputFormat,
    path: PathBuf,
    rows: usize,
}

impl CsvOutput<BufWriter<File>> {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Path>, format: OutputFormat) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        Ok(CsvOutput::new(BufWriter::new(file), format, path))
    }
}

impl<W: Write> CsvOutput<W> {
    /// # Arguments
    /// * `writer` - Destination of the rows
    /// * `format` - Column layout
    /// * `path` - Name used in error messages
    pub fn new(writer: W, format: OutputFormat, path: impl Into<PathBuf>) -> Self {
        CsvOutput {
            writer,
            format,
            path: path.into(),
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn format_row(&self, row: &EstimateRow) -> Result<String> {
        match self.format {
            OutputFormat::FourColumn => Ok(format!(
                "{:.6},{},{},{}",
                row.timestamp,
                row.ground_truth,
                row.estimate,
                row.error()
            )),
            OutputFormat::FiveColumn => {
                let noisy = row.noisy.ok_or_else(|| {
                    Error::InvalidParameter(format!(
                        "row at {} has no noisy measurement for 5-column output",
                        row.timestamp
                    ))
                })?;
                Ok(format!(
                    "{:.6},{},{},{},{}",
                    row.timestamp,
                    row.ground_truth,
                    noisy,
                    row.estimate,
                    row.error()
                ))
            }
        }
    }
}

impl<W: Write> OutputHandler for CsvOutput<W> {
    fn handle_row(&mut self, row: &EstimateRow) -> Result<()> {
        let line = self.format_row(row)?;
        writeln!(self.writer, "{}", line).map_err(|e| Error::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::io(&self.path, e))
    }
}

/// Write every row to `handler`, then flush it
pub fn write_rows<H: OutputHandler + ?Sized>(handler: &mut H, rows: &[EstimateRow]) -> Result<()> {
    for row in rows {
        handler.handle_row(row)?;
    }
    handler.finish()
}
