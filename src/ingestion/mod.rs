//! Decoders and the lazy record stream they produce.
//!
//! Most callers should go through [`DecoderRegistry::resolve`] (from [`unified`]) which picks an
//! [`IngestionFormat`] from the file extension, then call [`IngestionFormat::decode`] to get a
//! [`RecordStream`].
//!
//! Format-specific decoders are also available under:
//! - [`text`]
//! - [`csv`]
//! - `excel` (requires the `excel` feature), driven through [`bridge`]

pub mod bridge;
pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod stream;
pub mod text;
pub mod unified;

pub use bridge::{spawn_bridge, BridgeClosed, BridgeStream, RowAssembler, RowEvents, DEFAULT_BRIDGE_CAPACITY};
pub use stream::RecordStream;
pub use unified::{extension_of, DecoderRegistry, IngestionFormat};
