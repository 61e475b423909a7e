//! Memory-layout extraction from GNU ld linker scripts.
//!
//! # Modules
//!
//! - [`size_expr`]: `0x1000`, `4K`, `(A+B)` style size/address arithmetic
//! - [`memory`]: [`MemoryRegion`] and the `MEMORY { … }` block scanner
//! - [`map_file`]: map-file parser and the external [`LinkerProbe`]
//! - [`error`]: [`LinkerScriptError`]
//!
//! Parsing is permissive: a region line that does not match the expected
//! grammar is skipped, never reported. Only I/O and process failures are
//! errors.

#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
// TODO: Add rustdoc to MemoryRegion fields and LinkerScriptError variant fields
#![allow(missing_docs)]

pub mod error;
pub mod map_file;
pub mod memory;
pub mod size_expr;

// Top-level re-exports for convenience
pub use error::LinkerScriptError;
pub use map_file::{parse_map_file, LinkerProbe};
pub use memory::{
    parse_linker_script, parse_memory_block, total_flash, total_ram, MemoryRegion, DEFAULT_REGION,
};
pub use size_expr::eval_size;
