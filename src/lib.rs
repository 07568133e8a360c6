//! # pixchain
//!
//! A lazy, fluent image pipeline. Builder calls queue typed tasks; nothing
//! touches pixels until an export asks for a result.
//!
//! ```text
//! load ─► manipulate ─► filter ─► draw ─► export
//! blob     resize        grayscale  text    bytes / surface / data URI
//! file     crop          pixelize   line
//! surface  rotate        blur       polygon
//!          perspective              rectangle
//! ```
//!
//! Every stage consumes one RGBA [`Surface`](imaging::Surface) and returns
//! another. A flush runs the whole queue in order; the first failure aborts it
//! and discards the remaining tasks. The last flushed surface is cached, so
//! exporting twice without new work re-uses it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Task queue, flush/dispatch, surface slots, export entry points |
//! | [`loader`] | Built-in loaders: encoded bytes, files, surfaces, decoded images |
//! | [`exporter`] | Blob, canvas and data-URI exporters, mime/quality resolution |
//! | [`imaging`] | Pure pixel operations: geometry, filters, vector and text drawing, EXIF |
//! | [`recipe`] | TOML recipes: a saved, replayable list of pipeline steps |
//! | [`config`] | `pixchain.toml` loading, validation and merging over stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Lazy Queue, Eager Validation at Flush
//!
//! Builders never fail. Parameters are captured as-is and validated when the
//! task runs, so a chain reads top to bottom and every error comes out of one
//! place: [`pipeline::Pipeline::flush`] (or an export, which flushes first).
//!
//! ## Async Surface, Synchronous Core
//!
//! Tasks are boxed futures so loaders can suspend on I/O. The built-in pixel
//! stages are synchronous and parallelize rows with rayon internally. Callers
//! without a runtime drive the pipeline with `pollster::block_on`, which is
//! what the CLI does.
//!
//! ## Pure-Rust Rendering
//!
//! Decoding and encoding use the `image` crate; shapes and text rasterize
//! through `resvg`/`tiny-skia`. No system image libraries are needed.

pub mod config;
pub mod exporter;
pub mod imaging;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod recipe;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use exporter::{Blob, ExportError, ExportOptions, Exporter};
pub use imaging::Surface;
pub use loader::{Loaded, LoaderError, Source};
pub use pipeline::{Pipeline, PipelineError, Task, TaskKind};
