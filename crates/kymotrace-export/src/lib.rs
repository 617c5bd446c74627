//! kymotrace-export: Pure profile serializers (sans-IO)
//!
//! Writes line profiles as CSV to any [`std::io::Write`]. Choosing file
//! names and opening files is left to the caller.

pub mod series;

pub use series::{
    ALL_SERIES_FILENAME, CombinedSeriesWriter, ExportError, series_filename, to_series_csv,
    write_series,
};
