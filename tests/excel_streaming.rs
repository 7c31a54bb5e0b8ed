#![cfg(feature = "excel_test_writer")]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::{BoxFuture, FutureExt};

use file_publisher::execution::{PublishOptions, RunEvent, RunObserver, RunState, StreamingPublisher};
use file_publisher::ingestion::excel::decode_excel;
use file_publisher::ingestion::{DecoderRegistry, IngestionFormat};
use file_publisher::publish::{PublishOutcome, PublishSink};
use file_publisher::types::Record;
use file_publisher::PublishError;

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("file-publisher-{name}-{nanos}.xlsx"))
}

fn write_people_xlsx(path: &Path) {
    use rust_xlsxwriter::Workbook;

    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("People").unwrap();
    for (r, (id, name)) in [("1", "Ada"), ("2", "Grace"), ("3", "Linus"), ("4", "Barbara"), ("5", "Ken")]
        .into_iter()
        .enumerate()
    {
        ws.write_string(r as u32, 0, id).unwrap();
        ws.write_string(r as u32, 1, name).unwrap();
    }
    wb.save(path).unwrap();
}

fn write_two_sheet_xlsx(path: &Path) {
    use rust_xlsxwriter::Workbook;

    let mut wb = Workbook::new();

    let first = wb.add_worksheet();
    first.set_name("First").unwrap();
    first.write_string(0, 0, "a").unwrap();
    first.write_number(0, 1, 42).unwrap();
    // Row 1 left blank; row 2 has a gap in column 1.
    first.write_string(2, 0, "b").unwrap();
    first.write_string(2, 2, "c").unwrap();

    let second = wb.add_worksheet();
    second.set_name("Second").unwrap();
    second.write_string(0, 0, "z").unwrap();
    second.write_boolean(0, 1, true).unwrap();

    wb.save(path).unwrap();
}

/// Fails every record that starts with `reject_prefix`.
struct PrefixSink {
    reject_prefix: &'static str,
    seen: Mutex<Vec<String>>,
}

impl PublishSink for PrefixSink {
    fn destination(&self) -> &str {
        "people"
    }

    fn publish(&self, record: Record) -> BoxFuture<'static, PublishOutcome> {
        self.seen.lock().unwrap().push(record.as_str().to_string());
        let fail = record.as_str().starts_with(self.reject_prefix);
        async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            if fail {
                Err(PublishError::new("broker unavailable"))
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}

#[derive(Default)]
struct Failures(Mutex<Vec<String>>);

impl RunObserver for Failures {
    fn on_event(&self, event: &RunEvent) {
        if let RunEvent::PublishFailed { record, .. } = event {
            self.0.lock().unwrap().push(record.as_str().to_string());
        }
    }
}

#[tokio::test]
async fn spreadsheet_rows_stream_through_the_bridge_with_one_rejection() {
    let path = tmp_file("people");
    write_people_xlsx(&path);

    let sink = Arc::new(PrefixSink {
        reject_prefix: "3;",
        seen: Mutex::new(Vec::new()),
    });
    let failures = Arc::new(Failures::default());
    let publisher = StreamingPublisher::new(
        DecoderRegistry::default(),
        sink.clone(),
        PublishOptions {
            bridge_capacity: 2,
            max_in_flight: 4,
        },
    )
    .with_observer(failures.clone());

    let summary = publisher.run(&path).await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.format, Some(IngestionFormat::Excel));
    assert_eq!((summary.delivered, summary.failed), (4, 1));
    assert_eq!(*failures.0.lock().unwrap(), vec!["3;Linus".to_string()]);
    assert_eq!(
        *sink.seen.lock().unwrap(),
        vec!["1;Ada", "2;Grace", "3;Linus", "4;Barbara", "5;Ken"]
    );
    let _ = std::fs::remove_file(path);
}

#[test]
fn sheets_are_read_in_order_and_blank_rows_skipped() {
    let path = tmp_file("two-sheets");
    write_two_sheet_xlsx(&path);

    let file = std::fs::File::open(&path).unwrap();
    let got: Vec<String> = decode_excel(file, 1)
        .unwrap()
        .map(|r| r.unwrap().into_string())
        .collect();

    assert_eq!(got, vec!["a;42", "b;;c", "z;true"]);
    let _ = std::fs::remove_file(path);
}

#[test]
fn closing_early_stops_the_sheet_reader() {
    let path = tmp_file("close-early");
    write_people_xlsx(&path);

    let file = std::fs::File::open(&path).unwrap();
    let mut records = decode_excel(file, 1).unwrap();
    let first = records.next().unwrap().unwrap();
    assert_eq!(first.as_str(), "1;Ada");

    records.close();
    assert!(records.is_closed());
    assert!(records.next().is_none());
    let _ = std::fs::remove_file(path);
}
