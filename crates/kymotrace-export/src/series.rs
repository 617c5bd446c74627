//! CSV serialization of line profiles.
//!
//! Two layouts are produced:
//!
//! - one file per line, header `time,intensity`
//! - a combined file for the whole run, header `time,intensity,series`
//!
//! Numbers are rendered with [`f64`]'s `Display`, so `100.0` is written
//! as `100` and NaN as `NaN`. Every record, the last one included, ends
//! with `\n`.

use std::io::Write;

use kymotrace_pipeline::LineProfile;

/// File name of the combined CSV for a run.
pub const ALL_SERIES_FILENAME: &str = "all_series.csv";

const SERIES_HEADER: [&str; 2] = ["time", "intensity"];
const COMBINED_HEADER: [&str; 3] = ["time", "intensity", "series"];

/// Errors that can occur while writing profiles.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The CSV encoder failed.
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The underlying writer failed while flushing.
    #[error("failed to flush output: {0}")]
    Io(#[from] std::io::Error),

    /// In-memory CSV output was not valid UTF-8.
    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Per-line file name for the line at `series_index` (zero-based).
#[must_use]
pub fn series_filename(series_index: usize) -> String {
    format!("series_{series_index:02}.csv")
}

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

fn into_inner<W: Write>(mut writer: csv::Writer<W>) -> Result<W, ExportError> {
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(std::io::Error::new(e.error().kind(), e.to_string())))
}

/// Write one profile as a standalone `time,intensity` CSV.
///
/// # Errors
///
/// Returns [`ExportError`] if encoding or flushing fails.
pub fn write_series<W: Write>(writer: W, profile: &LineProfile) -> Result<W, ExportError> {
    let mut csv = csv_writer(writer);
    csv.write_record(SERIES_HEADER)?;
    for (time, intensity) in profile.samples() {
        csv.write_record([time.to_string(), intensity.to_string()])?;
    }
    into_inner(csv)
}

/// Render one profile as a standalone CSV string.
///
/// # Errors
///
/// Returns [`ExportError`] if encoding fails or the output is not UTF-8.
pub fn to_series_csv(profile: &LineProfile) -> Result<String, ExportError> {
    let bytes = write_series(Vec::new(), profile)?;
    Ok(String::from_utf8(bytes)?)
}

/// Streams every line of a run into one `time,intensity,series` CSV.
///
/// The header is written on construction, so a run that finds no lines
/// still produces a valid, header-only file.
pub struct CombinedSeriesWriter<W: Write> {
    csv: csv::Writer<W>,
    series_written: usize,
}

impl<W: Write> CombinedSeriesWriter<W> {
    /// Start a combined CSV on `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the header cannot be written.
    pub fn new(writer: W) -> Result<Self, ExportError> {
        let mut csv = csv_writer(writer);
        csv.write_record(COMBINED_HEADER)?;
        Ok(Self {
            csv,
            series_written: 0,
        })
    }

    /// Append every sample of `profile`, tagged with `series_index`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if encoding fails.
    pub fn append(
        &mut self,
        series_index: usize,
        profile: &LineProfile,
    ) -> Result<(), ExportError> {
        let series = series_index.to_string();
        for (time, intensity) in profile.samples() {
            self.csv
                .write_record([time.to_string(), intensity.to_string(), series.clone()])?;
        }
        self.series_written += 1;
        Ok(())
    }

    /// Number of profiles appended so far.
    #[must_use]
    pub const fn series_written(&self) -> usize {
        self.series_written
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] if the final flush fails.
    pub fn finish(self) -> Result<W, ExportError> {
        into_inner(self.csv)
    }
}
