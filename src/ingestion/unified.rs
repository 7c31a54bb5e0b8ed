//! Decoder selection by file extension.
//!
//! The set of decoders is closed: [`IngestionFormat`] names each one, and a [`DecoderRegistry`]
//! holds an ordered subset of them. [`DecoderRegistry::resolve`] picks the first registered
//! format that supports the file's extension.
//!
//! - Extension matching is case-insensitive.
//! - Resolution never looks at file content.
//! - An unknown extension fails with [`IngestionError::UnsupportedFormat`] before any byte is read.

use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::{IngestionError, IngestionResult};

use super::stream::RecordStream;
use super::{csv, text};

/// Supported input formats, one per decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionFormat {
    /// Plain text, one record per line.
    Text,
    /// Comma-separated values.
    Csv,
    /// Spreadsheet/workbook formats (decoding feature-gated behind `excel`).
    Excel,
}

impl IngestionFormat {
    /// All formats in default registration order.
    pub const ALL: [IngestionFormat; 3] = [Self::Text, Self::Csv, Self::Excel];

    /// File extensions (lowercase, without the dot) handled by this format.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Text => &["txt"],
            Self::Csv => &["csv"],
            Self::Excel => &["xlsx", "xls", "xlsm", "xlsb", "ods"],
        }
    }

    /// Whether this format handles `extension` (case-insensitive, no leading dot).
    pub fn supports(self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    /// Short decoder name used in logs and summaries.
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Csv => "csv",
            Self::Excel => "excel",
        }
    }

    /// Whether this format is decoded through the push-to-pull bridge.
    pub fn is_event_driven(self) -> bool {
        matches!(self, Self::Excel)
    }

    /// Decode `input` into a lazy record stream.
    ///
    /// `bridge_capacity` bounds buffering for event-driven formats and is ignored otherwise.
    /// The returned stream owns `input`.
    pub fn decode<R>(self, input: R, bridge_capacity: usize) -> IngestionResult<RecordStream>
    where
        R: Read + Send + 'static,
    {
        match self {
            Self::Text => Ok(text::decode_text(input)),
            Self::Csv => Ok(csv::decode_csv(input)),
            Self::Excel => decode_excel_dispatch(input, bridge_capacity),
        }
    }
}

impl fmt::Display for IngestionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn decode_excel_dispatch<R>(input: R, bridge_capacity: usize) -> IngestionResult<RecordStream>
where
    R: Read + Send + 'static,
{
    #[cfg(feature = "excel")]
    {
        super::excel::decode_excel(input, bridge_capacity)
    }

    #[cfg(not(feature = "excel"))]
    {
        // Avoid unused warnings when the feature is off.
        let _ = (input, bridge_capacity);
        Err(IngestionError::FeatureDisabled { feature: "excel" })
    }
}

/// The part of `file_name` after its last `.`, or `""` if there is none.
///
/// Only the final path component is considered, so dots in directory names are ignored:
/// `dir.v2/file` has no extension rather than the extension `v2/file`. This narrows the plain
/// "after the last dot of the name" rule; both agree whenever the directories carry no dots.
pub fn extension_of(file_name: &str) -> &str {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    match base.rfind('.') {
        Some(idx) => &base[idx + 1..],
        None => "",
    }
}

/// Ordered set of decoders consulted by [`DecoderRegistry::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderRegistry {
    formats: Vec<IngestionFormat>,
}

impl DecoderRegistry {
    /// Create a registry that consults `formats` in the given order.
    pub fn new(formats: Vec<IngestionFormat>) -> Self {
        Self { formats }
    }

    /// Append a format to the end of the registration order.
    pub fn register(mut self, format: IngestionFormat) -> Self {
        self.formats.push(format);
        self
    }

    /// Registered formats in registration order.
    pub fn formats(&self) -> &[IngestionFormat] {
        &self.formats
    }

    /// Select the decoder for `path` from its extension.
    ///
    /// ```rust
    /// use file_publisher::ingestion::{DecoderRegistry, IngestionFormat};
    /// use file_publisher::IngestionError;
    ///
    /// let registry = DecoderRegistry::default();
    /// assert_eq!(registry.resolve("data/People.CSV").unwrap(), IngestionFormat::Csv);
    ///
    /// let err = registry.resolve("report.docx").unwrap_err();
    /// assert!(matches!(err, IngestionError::UnsupportedFormat { ref extension } if extension == "docx"));
    /// ```
    pub fn resolve(&self, path: impl AsRef<Path>) -> IngestionResult<IngestionFormat> {
        let name = path.as_ref().to_string_lossy();
        let extension = extension_of(&name);
        self.formats
            .iter()
            .copied()
            .find(|f| f.supports(extension))
            .ok_or_else(|| IngestionError::UnsupportedFormat {
                extension: extension.to_string(),
            })
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new(IngestionFormat::ALL.to_vec())
    }
}
