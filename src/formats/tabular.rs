//! Tabular spectrum sources.
//!
//! [`TabularReader`] consumes CSV rows shaped `(id, mass_list_json,
//! intensity_list_json)`, the export layout of spectral libraries that
//! keep whole peak lists as JSON arrays per row. [`read_peak_csv`] reads
//! the two-column `mass,intensity` files used as search queries.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecordsIntoIter;

use crate::spectrum::{DomainDataError, Metadata, Peak, RawSpectrum, SourceResult};

/// Reader for `(id, mass_list_json, intensity_list_json)` CSV rows.
///
/// The first row is treated as a header. Rows that cannot be decoded
/// (missing columns, unparseable JSON, mismatched list lengths) surface as
/// `Err` items so the pipeline can count them as skipped and keep going.
pub struct TabularReader<R: Read> {
    records: StringRecordsIntoIter<R>,
    row: u64,
}

impl TabularReader<File> {
    /// Open a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// Returns a CSV error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, csv::Error> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path.as_ref())?;
        Ok(Self {
            records: reader.into_records(),
            row: 0,
        })
    }
}

impl<R: Read> TabularReader<R> {
    /// Wrap an already-open reader. The first row is treated as a header.
    pub fn from_reader(reader: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Self {
            records: reader.into_records(),
            row: 0,
        }
    }

    fn decode(&self, record: &csv::StringRecord) -> Result<RawSpectrum, DomainDataError> {
        let id = record
            .get(0)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                DomainDataError::MalformedRecord(format!("row {}: missing id column", self.row))
            })?;

        let masses = parse_json_array(record.get(1), self.row, "mass")?;
        let intensities = parse_json_array(record.get(2), self.row, "intensity")?;

        if masses.len() != intensities.len() {
            return Err(DomainDataError::PeakListMismatch {
                masses: masses.len(),
                intensities: intensities.len(),
            });
        }

        let peaks = masses
            .into_iter()
            .zip(intensities)
            .map(|(mz, intensity)| Peak::new(mz, intensity))
            .collect();

        Ok(RawSpectrum {
            native_id: Some(id.trim().to_string()),
            peaks,
            metadata: Metadata::new(),
        })
    }
}

fn parse_json_array(
    field: Option<&str>,
    row: u64,
    what: &str,
) -> Result<Vec<f64>, DomainDataError> {
    let field = field.ok_or_else(|| {
        DomainDataError::MalformedRecord(format!("row {row}: missing {what} column"))
    })?;

    serde_json::from_str(field).map_err(|e| {
        DomainDataError::MalformedRecord(format!("row {row}: bad {what} list: {e}"))
    })
}

impl<R: Read> Iterator for TabularReader<R> {
    type Item = SourceResult;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        self.row += 1;

        match record {
            Ok(record) => Some(self.decode(&record)),
            Err(e) => Some(Err(DomainDataError::MalformedRecord(format!(
                "row {}: {e}",
                self.row
            )))),
        }
    }
}

/// Read a two-column `mass,intensity` CSV into a peak list.
///
/// Rows that are empty, short, or non-numeric are skipped, so hand-edited
/// query files with stray lines still load.
///
/// # Errors
///
/// Returns a CSV error if the file cannot be opened or read.
pub fn read_peak_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Peak>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path.as_ref())?;

    let mut peaks = Vec::new();
    for record in reader.records() {
        let record = record?;
        let (Some(mz), Some(intensity)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let (Ok(mz), Ok(intensity)) = (mz.trim().parse::<f64>(), intensity.trim().parse::<f64>())
        else {
            continue;
        };
        peaks.push(Peak::new(mz, intensity));
    }

    Ok(peaks)
}
