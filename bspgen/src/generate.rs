use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use bsp::{GeneratorConfig, ManifestProbe};
use colored::Colorize;

pub fn run(config: &GeneratorConfig, manifest: &Path) -> Result<()> {
    println!();
    println!("{}", "Generating board support package...".cyan().bold());
    println!();

    let start = Instant::now();
    let probe = ManifestProbe::load(manifest)
        .with_context(|| format!("Failed to load scan manifest {}", manifest.display()))?;

    let report = bsp::generate(config, &probe).context("BSP generation failed")?;

    for (target, reason) in &report.skipped {
        println!("{}", format!("  - {target}: {reason}").yellow());
    }
    if report.unsupported > 0 {
        println!(
            "{}",
            format!("  - {} target(s) not supported by the toolchain", report.unsupported).yellow()
        );
    }
    println!();
    println!(
        "{}",
        format!(
            "  ✓ {} target(s) written to {} in {:.2}s",
            report.emitted.len(),
            report.output.display(),
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!("  Hex files: {}", report.hex_report.display());
    Ok(())
}
