//! Error types for BSP generation.

use std::io;
use std::path::PathBuf;

use linker_script::LinkerScriptError;

use crate::scan::ProbeError;
use crate::xml::XmlError;

/// Errors that abort a generator run.
#[derive(Debug, thiserror::Error)]
pub enum BspError {
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    LinkerScript(#[from] LinkerScriptError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot list samples: {0}")]
    Walk(#[from] walkdir::Error),

    /// The template lacks a node the generator grafts into.
    #[error("BSP template has no <{0}> node")]
    TemplateNode(String),

    /// An artifact's supporting targets are not all targets of the
    /// framework that owns it. Aggregation attributed it wrongly.
    #[error(
        "framework {framework}: {artifact} is required by {count} target(s) \
         outside the framework's {supported} supported target(s)"
    )]
    ConditionOutOfScope {
        framework: String,
        artifact: String,
        count: usize,
        supported: usize,
    },
}
