//! Evaluator for the address and size expressions found in `MEMORY` blocks.
//!
//! Grammar accepted (whitespace ignored):
//!
//! ```text
//! expr    := literal | "(" expr ")" | expr ("+" | "-") expr
//! literal := ("0x" hex+ | dec+) ["K" | "M"]
//! ```
//!
//! Composition splits at the last top-level operator, so `A-B-C` is `(A-B)-C`.
//! Anything else (symbols, `ORIGIN(FLASH)`, unary minus) does not evaluate.

const KIB: u64 = 1024;
const MIB: u64 = 1_048_576;

/// Evaluate a size or address expression to a byte count.
///
/// Returns `None` for malformed input, unbalanced parentheses, overflow,
/// or a subtraction that would go below zero.
///
/// ```
/// use linker_script::eval_size;
///
/// assert_eq!(eval_size("4K"), Some(4096));
/// assert_eq!(eval_size("0x1000+4K"), Some(8192));
/// assert_eq!(eval_size("0x2000-0x100"), Some(7936));
/// ```
pub fn eval_size(expr: &str) -> Option<u64> {
    let expr = expr.trim();
    if expr.is_empty() {
        return None;
    }

    if let Some(inner) = strip_enclosing_parens(expr) {
        return eval_size(inner);
    }

    match last_top_level_operator(expr)? {
        Some((pos, op)) => {
            let lhs = eval_size(expr.get(..pos)?)?;
            let rhs = eval_size(expr.get(pos..)?.strip_prefix(op)?)?;
            if op == '+' {
                lhs.checked_add(rhs)
            } else {
                lhs.checked_sub(rhs)
            }
        }
        None => parse_literal(expr),
    }
}

/// Returns the inner text when the whole expression is wrapped in one
/// matching pair of parentheses: `(A+B)` yes, `(A)+(B)` no.
fn strip_enclosing_parens(expr: &str) -> Option<&str> {
    let inner = expr.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth: usize = 0;
    for c in inner.chars() {
        match c {
            '(' => depth = depth.checked_add(1)?,
            // The opening paren closed before the end: not an enclosing pair.
            ')' => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

/// Finds the last `+`/`-` outside parentheses.
///
/// Outer `None` means the parentheses are unbalanced; inner `None` means
/// there is no top-level operator.
#[allow(clippy::option_option)]
fn last_top_level_operator(expr: &str) -> Option<Option<(usize, char)>> {
    let mut depth: usize = 0;
    let mut found = None;
    for (pos, c) in expr.char_indices() {
        match c {
            '(' => depth = depth.checked_add(1)?,
            ')' => depth = depth.checked_sub(1)?,
            '+' | '-' if depth == 0 => found = Some((pos, c)),
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    Some(found)
}

fn parse_literal(lit: &str) -> Option<u64> {
    let (body, multiplier) = if let Some(body) = lit.strip_suffix(['K', 'k']) {
        (body, KIB)
    } else if let Some(body) = lit.strip_suffix(['M', 'm']) {
        (body, MIB)
    } else {
        (lit, 1)
    };
    let body = body.trim_end();

    let value = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok()?
    } else {
        if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        body.parse::<u64>().ok()?
    };

    value.checked_mul(multiplier)
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn decimal_and_hex_literals() {
        assert_eq!(eval_size("0"), Some(0));
        assert_eq!(eval_size("1234"), Some(1234));
        assert_eq!(eval_size("0x1000"), Some(4096));
        assert_eq!(eval_size("0X1f"), Some(31));
        assert_eq!(eval_size("  0x20000000 "), Some(0x2000_0000));
    }

    #[test]
    fn suffixes_scale_by_binary_units() {
        assert_eq!(eval_size("4K"), Some(4096));
        assert_eq!(eval_size("4k"), Some(4096));
        assert_eq!(eval_size("1M"), Some(1_048_576));
        assert_eq!(eval_size("0x10K"), Some(16 * 1024));
    }

    #[test]
    fn single_composition() {
        assert_eq!(eval_size("0x1000+4K"), Some(8192));
        assert_eq!(eval_size("0x2000-0x100"), Some(7936));
        assert_eq!(eval_size("512K - 16K"), Some(496 * 1024));
    }

    #[test]
    fn parenthesised_and_chained() {
        assert_eq!(eval_size("(0x1000+0x1000)"), Some(8192));
        assert_eq!(eval_size("(64K)"), Some(65536));
        assert_eq!(eval_size("(0x100+0x100)-(0x80)"), Some(0x180));
        assert_eq!(eval_size("100-10-10"), Some(80));
    }

    #[test]
    fn malformed_input_does_not_evaluate() {
        assert_eq!(eval_size(""), None);
        assert_eq!(eval_size("0x"), None);
        assert_eq!(eval_size("K"), None);
        assert_eq!(eval_size("-4K"), None);
        assert_eq!(eval_size("ORIGIN(FLASH)"), None);
        assert_eq!(eval_size("__stack_size"), None);
        assert_eq!(eval_size("(0x1000"), None);
        assert_eq!(eval_size("0x1000)"), None);
        assert_eq!(eval_size("0x10-0x20"), None);
    }

    #[test]
    fn overflow_does_not_evaluate() {
        assert_eq!(eval_size("0xFFFFFFFFFFFFFFFF+1"), None);
        assert_eq!(eval_size("0xFFFFFFFFFFFFFFFFK"), None);
    }
}
