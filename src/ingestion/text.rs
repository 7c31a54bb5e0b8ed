//! Plain-text line decoder.

use std::io::{BufRead, BufReader, Read};

use crate::error::IngestionError;
use crate::types::Record;

use super::stream::RecordStream;

/// Decode UTF-8 text into one [`Record`] per line.
///
/// Lines are published verbatim (line terminators stripped). An I/O or UTF-8 error ends the
/// stream with [`IngestionError::Io`].
pub fn decode_text<R>(input: R) -> RecordStream
where
    R: Read + Send + 'static,
{
    let lines = BufReader::new(input)
        .lines()
        .map(|line| line.map(Record::from).map_err(IngestionError::from));
    RecordStream::from_iter(lines)
}
