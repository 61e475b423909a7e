//! Board-support-package generation for the mbed SDK.
//!
//! The toolchain reports, per hardware target, which sources, headers,
//! include directories and macros it builds with. This crate folds those
//! reports into a single BSP XML document for an IDE:
//!
//! 1. [`scan`]: one immutable [`TargetScan`] per target, obtained through a
//!    [`ToolchainProbe`]
//! 2. [`generate::select_targets`]: drop unsupported, empty, scriptless and
//!    deny-listed targets
//! 3. [`condition::aggregate`]: artifact → set of targets needing it
//! 4. [`mcu::build_mcu`]: per-target `<MCU>` nodes with memory maps
//! 5. [`emit::emit`]: family, frameworks and conditions grafted into the
//!    template
//!
//! Artifacts needed by every emitted target are universal and stored once on
//! the family. Everything else is attached to exactly the targets that
//! need it.

#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
// TODO: Document the remaining public struct fields (LibraryDescriptor, GenerationReport)
#![allow(missing_docs)]

pub mod condition;
pub mod config;
pub mod deny;
pub mod dump;
pub mod emit;
pub mod error;
pub mod generate;
pub mod hexfiles;
pub mod library;
pub mod mcu;
pub mod scan;
pub mod xml;

pub use condition::{aggregate, Aggregate, ConditionMap};
pub use config::{GeneratorConfig, LinkerData};
pub use error::BspError;
pub use generate::{dump_targets, generate, GenerationReport, SkipReason};
pub use library::LibraryDescriptor;
pub use scan::{ManifestProbe, ProbeError, TargetId, TargetScan, ToolchainProbe};
