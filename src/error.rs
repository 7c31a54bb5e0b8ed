use thiserror::Error;

/// Convenience result type for ingestion and run operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by decoder resolution, decoding, and the publish run.
///
/// Every variant is fatal to the run that raised it. Per-record delivery problems are reported
/// separately as [`PublishError`] and never surface here.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied, invalid UTF-8 line).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Spreadsheet decoding error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// Delimited-text decoding error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// No registered decoder handles the file extension.
    #[error("unsupported format: no decoder registered for extension '{extension}'")]
    UnsupportedFormat { extension: String },

    /// The decoder failed in a way not covered by a more specific variant
    /// (e.g. the decoding worker panicked).
    #[error("decode error: {message}")]
    Decode { message: String },

    /// The record stream was closed by its consumer before the decoder finished.
    #[error("record stream closed before the decoder finished")]
    Cancelled,

    /// The decoder exists but its cargo feature was not compiled in.
    #[error("{feature} decoding not enabled (enable cargo feature '{feature}')")]
    FeatureDisabled { feature: &'static str },

    /// Missing or invalid input argument.
    #[error("usage error: {message}")]
    Usage { message: String },

    /// The async runtime failed to drive the run (e.g. the streaming task was cancelled).
    #[error("runtime error: {message}")]
    Runtime { message: String },
}

/// Why a single record could not be delivered to the sink.
///
/// Recoverable: counted and logged, never stops the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("publish failed: {reason}")]
pub struct PublishError {
    /// Human-readable failure reason from the sink/transport.
    pub reason: String,
}

impl PublishError {
    /// Create a publish error from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
