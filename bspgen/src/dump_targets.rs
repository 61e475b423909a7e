use std::path::Path;

use anyhow::{Context, Result};
use bsp::config::PARSED_TARGETS_FILE_NAME;
use bsp::ManifestProbe;
use colored::Colorize;

pub fn run(sdk_root: &Path, manifest: &Path, output: Option<&Path>) -> Result<()> {
    let probe = ManifestProbe::load(manifest)
        .with_context(|| format!("Failed to load scan manifest {}", manifest.display()))?;
    let output = output.map_or_else(|| sdk_root.join(PARSED_TARGETS_FILE_NAME), Path::to_path_buf);

    let count = bsp::dump_targets(&probe, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{}",
        format!("✓ {count} target(s) dumped to {}", output.display()).green()
    );
    Ok(())
}
