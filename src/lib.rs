//! `file-publisher` streams the rows of one input file to a message broker topic.
//!
//! The input format is chosen from the file extension. Each row becomes a [`types::Record`]: its
//! fields joined with `;`. Records are submitted asynchronously to a [`publish::PublishSink`] and
//! the run reports how many were delivered and how many failed.
//!
//! ## What you can publish
//!
//! **File formats (auto-detected by extension, case-insensitive):**
//!
//! - **Text**: `.txt`, one record per line
//! - **CSV**: `.csv`, no header row assumed, fields joined with `;`
//! - **Spreadsheets** (requires the Cargo feature `excel`, on by default): `.xlsx`, `.xls`,
//!   `.xlsm`, `.xlsb`, `.ods`; every sheet in workbook order, one record per non-empty row
//!
//! Spreadsheet decoding is event-driven; [`ingestion::bridge`] turns its row callbacks into the
//! same pull-based [`ingestion::RecordStream`] the other formats produce, with a bounded buffer
//! between the decoding thread and the publisher.
//!
//! **Sinks:**
//!
//! - [`publish::LogSink`]: logs every record (dry runs)
//! - `publish::KafkaSink` (requires the Cargo feature `kafka`)
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use file_publisher::execution::{PublishOptions, StreamingPublisher};
//! use file_publisher::ingestion::DecoderRegistry;
//! use file_publisher::publish::LogSink;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), file_publisher::IngestionError> {
//! let publisher = StreamingPublisher::new(
//!     DecoderRegistry::default(),
//!     Arc::new(LogSink::new("file-lines")),
//!     PublishOptions::default(),
//! );
//! let summary = publisher.run("people.csv").await?;
//! assert_eq!(summary.submitted, summary.delivered + summary.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: decoder selection, format-specific decoders, the push-to-pull bridge
//! - [`publish`]: the sink contract and its implementations
//! - [`execution`]: the streaming publisher, run counters, and observer hooks
//! - [`types`]: the record type
//! - [`error`]: error types used across the crate
//! - [`logging`]: subscriber setup for the binary

pub mod error;
pub mod execution;
pub mod ingestion;
pub mod logging;
pub mod publish;
pub mod types;

pub use error::{IngestionError, IngestionResult, PublishError};
