// Sensor stream reader
//
// Reads `timestamp,position` records, one per line, no header.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::merge::Sample;

/// Read all samples from a sensor file, in file order
pub fn read_sensor_file(path: impl AsRef<Path>) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let samples = read_samples(BufReader::new(file), path)?;
    debug!(path = %path.display(), count = samples.len(), "Read sensor samples");
    Ok(samples)
}

/// Parse samples from any buffered reader
///
/// Blank lines are skipped and columns past the second are ignored.
/// Timestamps must be non-decreasing, since the merge relies on it.
///
/// # Arguments
/// * `reader` - Source of the records
/// * `path` - Name used in error messages
pub fn read_samples<R: BufRead>(reader: R, path: &Path) -> Result<Vec<Sample>> {
    let mut samples: Vec<Sample> = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let parse_err = |message: String| Error::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message,
        };

        let mut fields = line.split(',');
        let timestamp = parse_field(fields.next(), "timestamp").map_err(parse_err)?;
        let value = parse_field(fields.next(), "position").map_err(parse_err)?;

        if let Some(prev) = samples.last() {
            if timestamp < prev.timestamp {
                return Err(parse_err(format!(
                    "timestamp {} is earlier than previous timestamp {}",
                    timestamp, prev.timestamp
                )));
            }
        }

        samples.push(Sample::new(timestamp, value));
    }

    Ok(samples)
}

fn parse_field(field: Option<&str>, name: &str) -> std::result::Result<f64, String> {
    let field = field.map(str::trim).filter(|f| !f.is_empty())
        .ok_or_else(|| format!("missing {} column", name))?;
    let value: f64 = field
        .parse()
        .map_err(|e| format!("invalid {} '{}': {}", name, field, e))?;
    if !value.is_finite() {
        return Err(format!("{} '{}' is not finite", name, field));
    }
    Ok(value)
}
