//! Property-based tests for size-expression arithmetic and region filtering.
//! Verifies invariants hold for generated literals, not just fixed examples.

#![allow(clippy::arithmetic_side_effects, clippy::unwrap_used)]

use linker_script::{eval_size, parse_memory_block, DEFAULT_REGION};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Radix {
    Dec,
    Hex,
}

#[derive(Debug, Clone, Copy)]
enum Suffix {
    None,
    K,
    M,
}

impl Suffix {
    fn multiplier(self) -> u64 {
        match self {
            Suffix::None => 1,
            Suffix::K => 1024,
            Suffix::M => 1_048_576,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Suffix::None => "",
            Suffix::K => "K",
            Suffix::M => "M",
        }
    }
}

fn literal() -> impl Strategy<Value = (String, u64)> {
    (
        0u64..=0xFFFF_FFFF,
        prop_oneof![Just(Radix::Dec), Just(Radix::Hex)],
        prop_oneof![Just(Suffix::None), Just(Suffix::K), Just(Suffix::M)],
    )
        .prop_map(|(n, radix, suffix)| {
            let digits = match radix {
                Radix::Dec => n.to_string(),
                Radix::Hex => format!("0x{n:X}"),
            };
            (
                format!("{digits}{}", suffix.as_str()),
                n * suffix.multiplier(),
            )
        })
}

proptest! {
    /// Every generated literal evaluates to its numeric value times its suffix.
    #[test]
    fn literal_evaluates_exactly((text, value) in literal()) {
        prop_assert_eq!(eval_size(&text), Some(value));
    }

    /// `a+b` evaluates to the sum.
    #[test]
    fn addition_is_exact((a, va) in literal(), (b, vb) in literal()) {
        prop_assert_eq!(eval_size(&format!("{a}+{b}")), Some(va + vb));
        prop_assert_eq!(eval_size(&format!("({a} + {b})")), Some(va + vb));
    }

    /// `a-b` evaluates to the difference, or nothing when it would underflow.
    #[test]
    fn subtraction_is_exact_or_rejected((a, va) in literal(), (b, vb) in literal()) {
        prop_assert_eq!(eval_size(&format!("{a}-{b}")), va.checked_sub(vb));
    }

    /// The evaluator never panics, whatever the input.
    #[test]
    fn arbitrary_text_never_panics(text in "\\PC*") {
        let _ = eval_size(&text);
    }

    /// `*default*` and zero-sized regions never reach the output.
    #[test]
    fn placeholder_regions_never_appear(len in 0u64..=4, name in "[A-Z]{1,8}") {
        let script = format!(
            "MEMORY\n{{\n  {DEFAULT_REGION} : ORIGIN = 0x0, LENGTH = 0xFFFFFFFF\n  {name} (rwx) : ORIGIN = 0x20000000, LENGTH = {len}\n}}\n"
        );
        let regions = parse_memory_block(&script);
        prop_assert!(regions.iter().all(|r| r.name != DEFAULT_REGION));
        prop_assert!(regions.iter().all(|r| r.size != 0));
        prop_assert_eq!(regions.len(), usize::from(len != 0));
    }
}
