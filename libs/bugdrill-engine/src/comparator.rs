/// Output Comparator
///
/// Decides whether captured output matches an expected value. Knows
/// nothing about sandboxes or harnesses.
///
/// **Comparison Rules:**
/// 1. Trimmed actual text equal to the expected value's canonical text → match
/// 2. Actual text parses as JSON and both sides have the same canonical
///    text → match (covers key order, spacing, number spelling)
/// 3. Anything else → no match; there is no fuzzy matching

use serde_json::Value;
use std::fmt::Write;

/// How a comparison was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Exact,
    Canonical,
    Mismatch,
    /// Actual output is not structured data at all
    Ambiguous,
}

impl Comparison {
    pub fn passed(self) -> bool {
        matches!(self, Comparison::Exact | Comparison::Canonical)
    }
}

pub fn compare(expected: &Value, actual: &str) -> bool {
    compare_detailed(expected, actual).passed()
}

pub fn compare_detailed(expected: &Value, actual: &str) -> Comparison {
    let actual = actual.trim();
    let expected_text = canonical_text(expected);

    if expected_text.trim() == actual {
        return Comparison::Exact;
    }

    match serde_json::from_str::<Value>(actual) {
        Ok(parsed) if canonical_text(&parsed) == expected_text => Comparison::Canonical,
        Ok(_) => Comparison::Mismatch,
        Err(_) => Comparison::Ambiguous,
    }
}

/// Deterministic JSON text in the interpreter's default dump style:
/// `", "` and `": "` separators, sorted keys, ASCII-only strings.
pub fn canonical_text(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                let _ = write!(out, "{}", i);
            } else if let Some(u) = n.as_u64() {
                let _ = write!(out, "{}", u);
            } else if let Some(f) = n.as_f64() {
                out.push_str(&float_repr(f));
            }
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

/// Shortest round-trip float spelling: positional for exponents in
/// [-4, 16), scientific with a signed two-digit exponent otherwise.
pub(crate) fn float_repr(f: f64) -> String {
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{:e}", f.abs());
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return f.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return f.to_string();
    };

    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let sign = if f < 0.0 { "-" } else { "" };

    if (-4..16).contains(&exp) {
        let body = if exp < 0 {
            format!("0.{}{}", "0".repeat((-exp - 1) as usize), digits)
        } else {
            let int_len = exp as usize + 1;
            if digits.len() <= int_len {
                format!("{}{}.0", digits, "0".repeat(int_len - digits.len()))
            } else {
                format!("{}.{}", &digits[..int_len], &digits[int_len..])
            }
        };
        format!("{}{}", sign, body)
    } else {
        let mantissa = if digits.len() == 1 {
            digits
        } else {
            format!("{}.{}", &digits[..1], &digits[1..])
        };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{}{}e{}{:02}", sign, mantissa, exp_sign, exp.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_text_matches_dump_style() {
        assert_eq!(canonical_text(&json!([0, 1])), "[0, 1]");
        assert_eq!(canonical_text(&json!([-1, -1])), "[-1, -1]");
        assert_eq!(canonical_text(&json!({"b": 1, "a": [true, null]})), "{\"a\": [true, null], \"b\": 1}");
        assert_eq!(canonical_text(&json!("hi\n\"there\"")), "\"hi\\n\\\"there\\\"\"");
        assert_eq!(canonical_text(&json!([])), "[]");
        assert_eq!(canonical_text(&json!({})), "{}");
    }

    #[test]
    fn test_canonical_text_escapes_non_ascii() {
        assert_eq!(canonical_text(&json!("café")), "\"caf\\u00e9\"");
        assert_eq!(canonical_text(&json!("😀")), "\"\\ud83d\\ude00\"");
        assert_eq!(canonical_text(&json!("\u{7f}")), "\"\\u007f\"");
    }

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(0.5), "0.5");
        assert_eq!(float_repr(1.5), "1.5");
        assert_eq!(float_repr(123.0), "123.0");
        assert_eq!(float_repr(-2.25), "-2.25");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(0.00001), "1e-05");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e20), "1.5e+20");
        assert_eq!(float_repr(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(float_repr(0.0), "0.0");
    }

    #[test]
    fn test_compare_is_idempotent_on_canonical_text() {
        let values = vec![
            json!(null),
            json!(true),
            json!(42),
            json!(-7),
            json!(3.25),
            json!("text with \"quotes\" and ünïcode"),
            json!([1, [2, [3, []]]]),
            json!({"z": {"y": [1, 2.5, "x"]}, "a": null}),
            json!(u64::MAX),
        ];

        for value in values {
            let text = canonical_text(&value);
            assert!(compare(&value, &text), "{} did not match itself", text);
            assert_eq!(compare_detailed(&value, &text), Comparison::Exact);
        }
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(compare_detailed(&json!([0, 1]), "  [0, 1]\n"), Comparison::Exact);
    }

    #[test]
    fn test_structural_fallback() {
        assert_eq!(compare_detailed(&json!([0, 1]), "[0,1]"), Comparison::Canonical);
        assert_eq!(
            compare_detailed(&json!({"a": 1, "b": 2}), "{\"b\": 2, \"a\": 1}"),
            Comparison::Canonical
        );
        assert_eq!(compare_detailed(&json!(2.5), "2.50"), Comparison::Canonical);
        assert_eq!(compare_detailed(&json!(100.0), "1e2"), Comparison::Canonical);
    }

    #[test]
    fn test_mismatch() {
        assert_eq!(compare_detailed(&json!([0, 1]), "[-1, -1]"), Comparison::Mismatch);
        assert_eq!(compare_detailed(&json!([0, 1]), "[1, 0]"), Comparison::Mismatch);
        assert_eq!(compare_detailed(&json!(1), "1.0"), Comparison::Mismatch);
    }

    #[test]
    fn test_unparsable_output_fails() {
        assert_eq!(compare_detailed(&json!([0, 1]), "(0, 1)"), Comparison::Ambiguous);
        assert_eq!(compare_detailed(&json!("abc"), "abc"), Comparison::Ambiguous);
        assert_eq!(compare_detailed(&json!([0, 1]), ""), Comparison::Ambiguous);
        assert!(!compare(&json!(null), "None"));
    }
}
