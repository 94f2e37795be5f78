//! Permissive numeric parsing for command values.
//!
//! Command values are parsed the way the C library's `atof` does: the
//! longest leading prefix that forms a number is used, and anything that
//! does not start with a number reads as `0.0`. Hosts rely on this, e.g.
//! `X velocity` with no value stops the axis.

/// Parse the leading number of `text`, or `0.0` if there is none.
///
/// Accepts an optional sign, digits with at most one decimal point, and
/// an optional exponent. Leading whitespace is skipped.
///
/// # Examples
///
/// ```
/// use rs_ramps::parsing::parse_value;
///
/// assert_eq!(parse_value("1.57"), 1.57);
/// assert_eq!(parse_value("-0.5rad"), -0.5);
/// assert_eq!(parse_value("  +2e2"), 200.0);
/// assert_eq!(parse_value(".25"), 0.25);
/// assert_eq!(parse_value("fast"), 0.0);
/// assert_eq!(parse_value(""), 0.0);
/// ```
pub fn parse_value(text: &str) -> f32 {
    let s = text.trim_start();
    let end = numeric_prefix_len(s);
    s[..end].parse().unwrap_or(0.0)
}

/// Length in bytes of the longest prefix of `s` that is a valid float.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }

    if digits == 0 {
        return 0;
    }

    // exponent only counts if at least one digit follows
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    i
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // parse_value Tests
    // =========================================================================

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_value("0"), 0.0);
        assert_eq!(parse_value("42"), 42.0);
        assert_eq!(parse_value("-3.25"), -3.25);
        assert!((parse_value("3.14159") - 3.14159).abs() < 1e-6);
    }

    #[test]
    fn trailing_garbage_is_ignored() {
        assert_eq!(parse_value("10mm"), 10.0);
        assert_eq!(parse_value("1.5.6"), 1.5);
        assert_eq!(parse_value("7e"), 7.0);
        assert_eq!(parse_value("7e+"), 7.0);
        assert_eq!(parse_value("2E-1x"), 0.2);
    }

    #[test]
    fn non_numeric_reads_zero() {
        assert_eq!(parse_value("ON"), 0.0);
        assert_eq!(parse_value("."), 0.0);
        assert_eq!(parse_value("-"), 0.0);
        assert_eq!(parse_value("+."), 0.0);
        assert_eq!(parse_value("e5"), 0.0);
    }

    #[test]
    fn trailing_decimal_point() {
        assert_eq!(parse_value("5."), 5.0);
        assert_eq!(parse_value("-5."), -5.0);
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_panics(s in "\\PC*") {
                let _ = parse_value(&s);
            }

            #[test]
            fn formatted_floats_round_trip(v in -1.0e6f32..1.0e6f32) {
                let text = alloc::format!("{v}");
                prop_assert_eq!(parse_value(&text), v);
            }

            #[test]
            fn suffix_does_not_change_value(v in -1000i32..1000, suffix in "[a-zA-Z ]{0,8}") {
                let text = alloc::format!("{v}{suffix}");
                prop_assert_eq!(parse_value(&text), v as f32);
            }
        }
    }
}
