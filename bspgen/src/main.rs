// CLI crate: argument structs are documented through clap's help text.
#![allow(missing_docs)]

mod dump_targets;
mod generate;
mod memory;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bspgen")]
#[command(about = "mbed board support package generator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate target scans into BSP.xml and hexfiles.txt
    Generate {
        /// Root of the mbed SDK checkout
        #[arg(long)]
        sdk_root: PathBuf,
        /// JSON scan manifest produced by the toolchain
        #[arg(long)]
        manifest: PathBuf,
        /// BSP skeleton to fill (built-in template if omitted)
        #[arg(long)]
        template: Option<PathBuf>,
        /// Per-target RAM/FLASH size overrides
        #[arg(long)]
        linker_data: Option<PathBuf>,
        /// Output file (default: <sdk-root>/BSP.xml)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also emit targets on the built-in deny-list
        #[arg(long)]
        alltargets: bool,
        /// GCC driver used to resolve memory maps through a trial link
        #[arg(long)]
        linker: Option<PathBuf>,
    },
    /// Write the raw per-target scans to ParsedTargets.xml
    DumpTargets {
        /// Root of the mbed SDK checkout
        #[arg(long)]
        sdk_root: PathBuf,
        /// JSON scan manifest produced by the toolchain
        #[arg(long)]
        manifest: PathBuf,
        /// Output file (default: <sdk-root>/ParsedTargets.xml)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the memory regions of a linker script
    Memory {
        /// Linker script, or GNU ld map file with --map
        script: PathBuf,
        /// Treat the input as a map file
        #[arg(long, conflicts_with = "linker")]
        map: bool,
        /// Resolve regions by linking with this GCC driver
        #[arg(long)]
        linker: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            sdk_root,
            manifest,
            template,
            linker_data,
            output,
            alltargets,
            linker,
        } => {
            let mut config = bsp::GeneratorConfig::new(sdk_root);
            config.template = template;
            config.linker_data = linker_data;
            config.output = output;
            config.include_ignored = alltargets;
            config.linker = linker;
            generate::run(&config, &manifest)
        }
        Commands::DumpTargets {
            sdk_root,
            manifest,
            output,
        } => dump_targets::run(&sdk_root, &manifest, output.as_deref()),
        Commands::Memory {
            script,
            map,
            linker,
        } => memory::run(&script, map, linker.as_deref()),
    }
}
