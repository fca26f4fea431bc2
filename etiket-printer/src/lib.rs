//! # etiket-printer
//!
//! TSPL label printer library - label compilation and low-level dispatch.
//!
//! ## Scope
//!
//! This crate handles HOW to produce and deliver a label:
//! - TSPL command building
//! - CP1251 encoding for Cyrillic label printers
//! - Compiling a [`shared::LabelSpec`] into a printable [`Document`]
//! - The print-sink capability (`enumerate` + `send`) and its raw-TCP
//!   implementation
//!
//! WHAT gets printed and WHERE it executes (presence, delegation) stays in
//! the hub and terminal crates.
//!
//! ## Example
//!
//! ```ignore
//! use etiket_printer::{LabelCompiler, NetworkSink, SinkCapability};
//! use shared::LabelSpec;
//!
//! let compiler = LabelCompiler::default();
//! let doc = compiler.compile(&LabelSpec::from_product(&product, 3))?;
//!
//! let sink = NetworkSink::new("192.168.1.40", 9100)?;
//! sink.send(sink.id(), &doc).await?;
//! ```

mod compiler;
mod encoding;
mod error;
mod sink;
mod tspl;

// Re-exports
pub use compiler::{Document, LabelCompiler, convert_currency};
pub use encoding::{cp1251_width, encode_cp1251, pad_cp1251, truncate_cp1251};
pub use error::{PrintError, PrintResult};
pub use sink::{NetworkSink, SinkCapability, SinkInfo, SinkKind, StaticSinkPool};
pub use tspl::TsplBuilder;
