//! `MEMORY { … }` block parsing.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::LinkerScriptError;
use crate::size_expr::eval_size;

/// Placeholder region the linker reports for addresses outside any region.
pub const DEFAULT_REGION: &str = "*default*";

/// One named address range from a linker script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub name: String,
    pub start: u64,
    pub size: u64,
}

impl MemoryRegion {
    pub fn new(name: impl Into<String>, start: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            start,
            size,
        }
    }

    /// Whether this region would be dropped from parser output.
    pub(crate) fn is_placeholder(&self) -> bool {
        self.name == DEFAULT_REGION || self.size == 0
    }
}

/// Sum of the sizes of regions whose upper-cased name contains `RAM`.
pub fn total_ram(regions: &[MemoryRegion]) -> u64 {
    total_matching(regions, "RAM")
}

/// Sum of the sizes of regions whose upper-cased name contains `FLASH`.
pub fn total_flash(regions: &[MemoryRegion]) -> u64 {
    total_matching(regions, "FLASH")
}

fn total_matching(regions: &[MemoryRegion], needle: &str) -> u64 {
    regions
        .iter()
        .filter(|r| r.name.to_ascii_uppercase().contains(needle))
        .fold(0u64, |acc, r| acc.saturating_add(r.size))
}

// Literal pattern, exercised by every test in this module.
#[allow(clippy::unwrap_used)]
fn region_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<name>[A-Za-z0-9_.*]+)\s*(?:\([^()]*\))?\s*:\s*(?:ORIGIN|org|o)\s*=\s*(?P<origin>[^,]+?)\s*,\s*(?:LENGTH|len|l)\s*=\s*(?P<length>[^,;]+?)\s*[,;]?\s*$",
        )
        .unwrap()
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Outside,
    AwaitingBrace,
    Inside,
}

/// Extract the regions of the first `MEMORY` block in `script`.
///
/// Lines that do not look like `NAME (attrs) : ORIGIN = expr, LENGTH = expr`,
/// or whose expressions do not evaluate, are skipped without error.
/// `*default*` and zero-sized regions are dropped.
pub fn parse_memory_block(script: &str) -> Vec<MemoryRegion> {
    let mut regions = Vec::new();
    let mut state = BlockState::Outside;
    let mut in_comment = false;

    for raw in script.lines() {
        let line = strip_comments(raw, &mut in_comment);
        let mut rest = line.as_str();

        if state == BlockState::Outside {
            let trimmed = rest.trim_start();
            match trimmed.strip_prefix("MEMORY") {
                Some(after) if after.is_empty() || after.starts_with([' ', '\t', '{']) => {
                    state = BlockState::AwaitingBrace;
                    rest = after;
                }
                _ => continue,
            }
        }

        if state == BlockState::AwaitingBrace {
            match rest.split_once('{') {
                Some((_, after)) => {
                    state = BlockState::Inside;
                    rest = after;
                }
                None => continue,
            }
        }

        let (body, closed) = match rest.split_once('}') {
            Some((before, _)) => (before, true),
            None => (rest, false),
        };
        if let Some(region) = parse_region_line(body) {
            regions.push(region);
        }
        if closed {
            break;
        }
    }

    regions
}

/// Read `path` and extract its `MEMORY` regions.
pub fn parse_linker_script(path: &Path) -> Result<Vec<MemoryRegion>, LinkerScriptError> {
    let text = fs::read_to_string(path).map_err(|source| LinkerScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let regions = parse_memory_block(&text);
    tracing::debug!(
        script = %path.display(),
        count = regions.len(),
        "parsed MEMORY block"
    );
    Ok(regions)
}

fn parse_region_line(line: &str) -> Option<MemoryRegion> {
    let caps = region_line().captures(line)?;
    let region = MemoryRegion::new(
        caps.name("name")?.as_str(),
        eval_size(caps.name("origin")?.as_str())?,
        eval_size(caps.name("length")?.as_str())?,
    );
    (!region.is_placeholder()).then_some(region)
}

/// Remove `/* … */` comments, carrying an open comment across lines.
fn strip_comments(line: &str, in_comment: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    loop {
        if *in_comment {
            match rest.split_once("*/") {
                Some((_, after)) => {
                    *in_comment = false;
                    rest = after;
                }
                None => return out,
            }
        } else {
            match rest.split_once("/*") {
                Some((before, after)) => {
                    out.push_str(before);
                    out.push(' ');
                    *in_comment = true;
                    rest = after;
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    const STM32_LD: &str = r#"
/* Linker script for STM32F401RE */
ENTRY(Reset_Handler)

MEMORY
{
  FLASH (rx)      : ORIGIN = 0x08000000, LENGTH = 512K
  RAM (xrw)       : ORIGIN = 0x20000000, LENGTH = 0x18000 - 0x194 /* vectors */
  CCMRAM (rw)     : ORIGIN = 0x10000000, LENGTH = 0
}

SECTIONS
{
  .text : { *(.text*) } > FLASH
}
"#;

    #[test]
    fn parses_regions_in_order() {
        let regions = parse_memory_block(STM32_LD);
        assert_eq!(
            regions,
            vec![
                MemoryRegion::new("FLASH", 0x0800_0000, 512 * 1024),
                MemoryRegion::new("RAM", 0x2000_0000, 0x18000 - 0x194),
            ]
        );
    }

    #[test]
    fn zero_sized_region_is_dropped() {
        let regions = parse_memory_block(STM32_LD);
        assert!(regions.iter().all(|r| r.name != "CCMRAM"));
    }

    #[test]
    fn default_region_is_dropped() {
        let script = "MEMORY {\n  *default* : ORIGIN = 0, LENGTH = 0xFFFFFFFF\n  RAM (rw) : ORIGIN = 0x20000000, LENGTH = 16K\n}\n";
        let regions = parse_memory_block(script);
        assert_eq!(regions, vec![MemoryRegion::new("RAM", 0x2000_0000, 16384)]);
    }

    #[test]
    fn brace_on_memory_line_and_short_keywords() {
        let script = "MEMORY {\n  m_text (RX) : org = 0x410, len = 0x00080000 - 0x410\n  m_data (RW) : o = 0x1FFF0000, l = 64K\n}";
        let regions = parse_memory_block(script);
        assert_eq!(
            regions,
            vec![
                MemoryRegion::new("m_text", 0x410, 0x0008_0000 - 0x410),
                MemoryRegion::new("m_data", 0x1FFF_0000, 65536),
            ]
        );
    }

    #[test]
    fn parenthesised_length_and_origin_sum() {
        let script = "MEMORY\n{\n  FLASH (rx) : ORIGIN = 0x0 + 0x4000, LENGTH = (0x3C000+0x0)\n}\n";
        let regions = parse_memory_block(script);
        assert_eq!(regions, vec![MemoryRegion::new("FLASH", 0x4000, 0x3C000)]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let script = "MEMORY\n{\n  garbage line\n  FLASH (rx) : ORIGIN = __flash_start, LENGTH = 1M\n  RAM (rwx) : ORIGIN = 0x20000000, LENGTH = 32K\n}\n";
        let regions = parse_memory_block(script);
        assert_eq!(regions, vec![MemoryRegion::new("RAM", 0x2000_0000, 32768)]);
    }

    #[test]
    fn multi_line_comment_is_ignored() {
        let script = "MEMORY\n{\n/*\n  FLASH (rx) : ORIGIN = 0x0, LENGTH = 1M\n*/\n  RAM (rwx) : ORIGIN = 0x20000000, LENGTH = 32K\n}\n";
        let regions = parse_memory_block(script);
        assert_eq!(regions, vec![MemoryRegion::new("RAM", 0x2000_0000, 32768)]);
    }

    #[test]
    fn only_the_first_block_is_read() {
        let script = "MEMORY { RAM (rw) : ORIGIN = 0x0, LENGTH = 1K }\nMEMORY { ROM (rx) : ORIGIN = 0x0, LENGTH = 1K }\n";
        let regions = parse_memory_block(script);
        assert_eq!(regions, vec![MemoryRegion::new("RAM", 0, 1024)]);
    }

    #[test]
    fn lines_outside_memory_are_ignored() {
        let script = "FLASH (rx) : ORIGIN = 0x0, LENGTH = 1M\nMEMORY_SIZE = 4;\n";
        assert!(parse_memory_block(script).is_empty());
    }

    #[test]
    fn totals_match_names_case_insensitively() {
        let regions = vec![
            MemoryRegion::new("FLASH", 0, 1000),
            MemoryRegion::new("Flash_B", 0, 24),
            MemoryRegion::new("RAM", 0, 100),
            MemoryRegion::new("sram2", 0, 28),
            MemoryRegion::new("m_text", 0, 7),
        ];
        assert_eq!(total_flash(&regions), 1024);
        assert_eq!(total_ram(&regions), 128);
    }
}
