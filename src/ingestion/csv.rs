//! Delimited-text (CSV) decoder.

use std::io::Read;

use crate::error::IngestionError;
use crate::types::Record;

use super::stream::RecordStream;

/// Decode comma-separated input into one [`Record`] per row.
///
/// Rules:
///
/// - No header row is assumed: the first row is published like any other.
/// - Rows may have different field counts.
/// - Quoting is resolved by the CSV reader; the unquoted fields are joined with `;`.
/// - A malformed row (or invalid UTF-8) ends the stream with [`IngestionError::Csv`].
pub fn decode_csv<R>(input: R) -> RecordStream
where
    R: Read + Send + 'static,
{
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    decode_csv_from_reader(rdr)
}

/// Decode rows from an existing CSV reader (e.g. one configured with a different delimiter).
pub fn decode_csv_from_reader<R>(rdr: csv::Reader<R>) -> RecordStream
where
    R: Read + Send + 'static,
{
    let rows = rdr.into_records().map(|result| {
        result
            .map(|row| Record::from_fields(row.iter()))
            .map_err(IngestionError::from)
    });
    RecordStream::from_iter(rows)
}
