#![cfg(feature = "excel")]

use std::io::{Cursor, Read};

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::{IngestionError, IngestionResult};

use super::bridge::{spawn_bridge, RowEvents};
use super::stream::RecordStream;

/// Name given to the spreadsheet bridge worker thread.
pub const EXCEL_WORKER_NAME: &str = "xlsx-sheet-reader";

/// Decode a workbook (`.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`) into a [`RecordStream`].
///
/// The workbook is read by [`read_workbook`] on a bridge worker which owns `input` until the
/// stream is exhausted or closed; at most `capacity` decoded rows are buffered.
pub fn decode_excel<R>(input: R, capacity: usize) -> IngestionResult<RecordStream>
where
    R: Read + Send + 'static,
{
    let bridge = spawn_bridge(EXCEL_WORKER_NAME, capacity, move |rows| read_workbook(input, rows))?;
    Ok(RecordStream::from_bridge(bridge))
}

/// Walk every sheet of a workbook in order, reporting rows as events to `rows`.
///
/// Behavior:
/// - Rows with no non-empty cell are not reported
/// - Each reported row gets one `cell` per column up to its last non-empty cell; empty cells
///   before that report `""`
/// - Row numbers are 0-based sheet coordinates
/// - Stops with [`IngestionError::Cancelled`] as soon as `rows` reports it is closed
pub fn read_workbook<R, E>(mut input: R, rows: &mut E) -> IngestionResult<()>
where
    R: Read,
    E: RowEvents + ?Sized,
{
    // Workbook containers need random access, so the byte stream is buffered once here.
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let sheets: Vec<String> = workbook.sheet_names().to_vec();
    for sheet in sheets {
        if rows.is_closed() {
            return Err(IngestionError::Cancelled);
        }
        let range = workbook.worksheet_range(&sheet)?;
        emit_sheet_range(&range, rows)?;
    }
    Ok(())
}

fn emit_sheet_range<E>(range: &calamine::Range<Data>, rows: &mut E) -> IngestionResult<()>
where
    E: RowEvents + ?Sized,
{
    let first_row = range.start().map(|(r, _)| r).unwrap_or(0);
    for (idx0, row) in range.rows().enumerate() {
        let Some(last) = row.iter().rposition(|c| !matches!(c, Data::Empty)) else {
            continue;
        };

        let row_num = first_row + idx0 as u32;
        rows.start_row(row_num);
        for cell in &row[..=last] {
            rows.cell(cell_to_string(cell));
        }
        rows.end_row(row_num)?;
    }
    Ok(())
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        _ => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{cell_to_string, read_workbook};
    use calamine::Data;

    use crate::ingestion::bridge::{BridgeClosed, RowEvents};

    #[derive(Default)]
    struct Collect {
        rows: Vec<Vec<String>>,
        current: Vec<String>,
    }

    impl RowEvents for Collect {
        fn start_row(&mut self, _row: u32) {
            self.current.clear();
        }
        fn cell(&mut self, value: String) {
            self.current.push(value);
        }
        fn end_row(&mut self, _row: u32) -> Result<(), BridgeClosed> {
            self.rows.push(std::mem::take(&mut self.current));
            Ok(())
        }
    }

    #[test]
    fn cells_format_as_plain_text() {
        assert_eq!(cell_to_string(&Data::String("Ada".into())), "Ada");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn garbage_bytes_are_an_excel_error() {
        let mut sink = Collect::default();
        let err = read_workbook(&b"definitely not a workbook"[..], &mut sink).unwrap_err();
        assert!(err.to_string().contains("excel error"));
        assert!(sink.rows.is_empty());
    }
}
