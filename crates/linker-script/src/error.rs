//! Error type for linker-script reading and probing.

use std::io;
use std::path::PathBuf;

/// Failures that abort memory-layout extraction.
///
/// Individual malformed region lines are not errors; they are skipped.
#[derive(Debug, thiserror::Error)]
pub enum LinkerScriptError {
    /// The linker script could not be read.
    #[error("cannot read linker script {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The probe's scratch directory or empty source could not be written.
    #[error("cannot prepare scratch files for the linker probe: {0}")]
    Scratch(#[source] io::Error),
    /// The external linker could not be started.
    #[error("failed to run linker {}: {source}", .linker.display())]
    Spawn {
        linker: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The linker ran but wrote no map file.
    #[error("linker {} produced no map file for {}: {stderr}", .linker.display(), .script.display())]
    NoMapFile {
        linker: PathBuf,
        script: PathBuf,
        stderr: String,
    },
}
