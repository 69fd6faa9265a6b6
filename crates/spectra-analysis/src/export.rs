//! Text export of power spectral densities.
//!
//! One row per positive-frequency bin: the analog frequency followed by the
//! linear PSD of every channel at that bin, fixed width and space separated.
//! The file has `dft_size / 2` rows and no header, so it loads directly into
//! gnuplot or numpy.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Write a PSD table for `channels` (each a full `dft_size` PSD array).
///
/// Frequencies are `k * sample_rate / dft_size`.
pub fn write_psd_table<W: Write>(
    mut out: W,
    sample_rate: f64,
    channels: &[&[f64]],
) -> std::io::Result<()> {
    let Some(first) = channels.first() else {
        return Ok(());
    };
    let dft_size = first.len();
    let resolution = sample_rate / dft_size as f64;

    for k in 0..dft_size / 2 {
        write!(out, "{:12.3}", k as f64 * resolution)?;
        for psd in channels {
            write!(out, " {:16.8e}", psd[k])?;
        }
        writeln!(out)?;
    }
    out.flush()
}

/// Write a PSD table to the file at `path`.
pub fn export_psd_table(
    path: impl AsRef<Path>,
    sample_rate: f64,
    channels: &[&[f64]],
) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_psd_table(std::io::BufWriter::new(file), sample_rate, channels)
}

/// A PSD table read back from text.
#[derive(Debug, Clone, PartialEq)]
pub struct PsdTable {
    /// Frequency column, in Hz.
    pub frequencies: Vec<f64>,
    /// One column of linear PSD values per channel.
    pub channels: Vec<Vec<f64>>,
}

/// Read a PSD table written by [`write_psd_table`].
///
/// Blank lines and lines starting with `#` are skipped.
pub fn import_psd_table(path: impl AsRef<Path>) -> std::io::Result<PsdTable> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut table = PsdTable {
        frequencies: Vec::new(),
        channels: Vec::new(),
    };

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let Some((&freq, psd)) = values.split_first() else {
            continue;
        };
        if table.channels.is_empty() {
            table.channels = vec![Vec::new(); psd.len()];
        }
        if psd.len() != table.channels.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("row at {freq} Hz has {} columns, expected {}", psd.len(), table.channels.len()),
            ));
        }
        table.frequencies.push(freq);
        for (column, &value) in table.channels.iter_mut().zip(psd) {
            column.push(value);
        }
    }

    Ok(table)
}
