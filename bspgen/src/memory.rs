use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use linker_script::{
    parse_linker_script, parse_map_file, total_flash, total_ram, LinkerProbe, MemoryRegion,
};

pub fn run(script: &Path, map: bool, linker: Option<&Path>) -> Result<()> {
    let regions = load(script, map, linker)?;
    if regions.is_empty() {
        anyhow::bail!("No memory regions found in {}", script.display());
    }
    print!("{}", render(&regions));
    Ok(())
}

fn load(script: &Path, map: bool, linker: Option<&Path>) -> Result<Vec<MemoryRegion>> {
    if map {
        let text = fs::read_to_string(script)
            .with_context(|| format!("Failed to read map file {}", script.display()))?;
        return Ok(parse_map_file(&text));
    }
    let regions = match linker {
        Some(linker) => LinkerProbe::new(linker).probe(script),
        None => parse_linker_script(script),
    };
    regions.with_context(|| format!("Failed to read memory layout of {}", script.display()))
}

fn render(regions: &[MemoryRegion]) -> String {
    let mut out = String::new();
    for r in regions {
        out.push_str(&format!(
            "  {} 0x{:08X}  {:>10} bytes\n",
            format!("{:<16}", r.name).cyan(),
            r.start,
            r.size
        ));
    }
    out.push_str(&format!(
        "{}\n",
        format!(
            "  RAM total: {}  FLASH total: {}",
            total_ram(regions),
            total_flash(regions)
        )
        .bold()
    ));
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn map_file_regions_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.map");
        fs::write(
            &path,
            "Memory Configuration\n\nName             Origin             Length             Attributes\n\
             FLASH            0x08000000         0x00080000         xr\n\
             RAM              0x20000000         0x00018000         xrw\n\
             *default*        0x00000000         0xffffffff\n\n\
             Linker script and memory map\n",
        )
        .unwrap();

        let regions = load(&path, true, None).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0], MemoryRegion::new("FLASH", 0x0800_0000, 0x80000));
    }

    #[test]
    fn totals_are_rendered() {
        colored::control::set_override(false);
        let text = render(&[
            MemoryRegion::new("FLASH", 0x0800_0000, 0x80000),
            MemoryRegion::new("RAM", 0x2000_0000, 0x18000),
        ]);
        assert!(text.contains("RAM total: 98304"));
        assert!(text.contains("FLASH total: 524288"));
        assert!(text.contains("0x08000000"));
    }

    #[test]
    fn missing_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&dir.path().join("nope.ld"), false, None).is_err());
    }
}
