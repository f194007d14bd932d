//! Streaming reader for MSP peak-list files.
//!
//! MSP is a loose text format: each spectrum starts with `Key: Value`
//! metadata lines, a `Num Peaks:` marker opens the peak block, and
//! whitespace-separated `mass intensity` lines follow until a blank line
//! ends the spectrum. Field names vary between producers, so every header
//! line is kept verbatim in the spectrum's metadata; only the `Num Peaks`
//! marker is interpreted (case-insensitively). Non-numeric lines inside a
//! peak block are skipped. The final spectrum is flushed at end of file
//! even without a trailing blank line.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use serde_json::Value;

use crate::spectrum::{Metadata, Peak, RawSpectrum, SourceResult};

/// Streaming MSP reader yielding one [`RawSpectrum`] per block.
///
/// Blocks that carry metadata but no peaks are dropped, matching the
/// common producer behavior of separating records with multiple blank
/// lines.
pub struct MspReader<R: BufRead> {
    lines: Lines<R>,
    done: bool,
}

impl MspReader<BufReader<File>> {
    /// Open an MSP file for streaming.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::with_capacity(64 * 1024, file)))
    }
}

impl<R: BufRead> MspReader<R> {
    /// Wrap an already-open reader.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            done: false,
        }
    }
}

fn parse_peak_line(line: &str) -> Option<Peak> {
    let mut parts = line.split_whitespace();
    let mz: f64 = parts.next()?.parse().ok()?;
    let intensity: f64 = parts.next()?.parse().ok()?;
    Some(Peak::new(mz, intensity))
}

impl<R: BufRead> Iterator for MspReader<R> {
    type Item = SourceResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut metadata = Metadata::new();
        let mut peaks: Vec<Peak> = Vec::new();
        let mut in_peaks = false;

        loop {
            let line = match self.lines.next() {
                None => {
                    self.done = true;
                    break;
                }
                Some(Err(e)) => {
                    // A torn read mid-file ends the stream; everything
                    // parsed so far is still delivered.
                    log::warn!("MSP read error, stopping: {e}");
                    self.done = true;
                    break;
                }
                Some(Ok(line)) => line,
            };

            let line = line.trim();
            if line.is_empty() {
                // spectrum separator
                if !peaks.is_empty() {
                    break;
                }
                metadata.clear();
                in_peaks = false;
                continue;
            }

            if in_peaks {
                if let Some(peak) = parse_peak_line(line) {
                    peaks.push(peak);
                }
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim();
                if key.eq_ignore_ascii_case("num peaks") {
                    in_peaks = true;
                } else {
                    metadata.insert(key.to_string(), Value::String(value.to_string()));
                }
            }
            // lines without ':' outside a peak block are ignored
        }

        if peaks.is_empty() {
            return None;
        }

        Some(Ok(RawSpectrum {
            native_id: None,
            peaks,
            metadata,
        }))
    }
}
