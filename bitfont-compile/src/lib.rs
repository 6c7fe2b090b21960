//! Compiling bitmap glyph sources into C++ glyph tables.
//!
//! The pipeline has four stages:
//!
//! - [`reader`] streams 12px glyph bitmaps out of BDF-like sources,
//! - [`encoding`] maps each source code to a Unicode scalar value,
//! - [`merge`] layers several faces into one table per output, and
//! - [`emit`] writes the sorted tables and the header they share.
//!
//! [`compile`] drives all of them from a [`BuildPlan`].

pub mod bdf;
mod build;
pub mod emit;
pub mod encoding;
mod error;
pub mod face;
pub mod merge;
pub mod plan;
pub mod reader;

pub use build::{compile, Artifact, BuildOutput};
pub use error::{Error, ErrorReport, MalformedSource};
pub use plan::BuildPlan;
