/// Harness Synthesizer
///
/// Turns user source plus one test case's named inputs into a script that
/// calls the user's function once and prints its return value as JSON on
/// a single line.
///
/// The real signature is unknown, so arguments are bound either through a
/// fixed vocabulary of conventional parameter names (the default) or by
/// reading the parameter list from the definition itself.

use crate::comparator::float_repr;
use bugdrill_common::types::append_harness;
use bugdrill_common::BindingStrategy;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

lazy_static! {
    static ref DEF_LINE: Regex =
        Regex::new(r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(")
            .expect("definition pattern is valid");
}

/// Parameter names recognised by the `Known` strategy, in call order
pub const KNOWN_PARAMETERS: &[&str] = &["nums", "arr", "target", "k", "s", "t"];

const MISSING_SYMBOL: &str = "raise NameError(\"no function definition found in submitted code\")";

/// Script ready for one sandbox run; never stored
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessedSource {
    pub symbol: Option<String>,
    pub arguments: Vec<String>,
    /// Driver lines appended after the user source
    pub invocation: String,
    /// User source followed by `invocation`
    pub source: String,
}

/// Name of the first function defined in `source`
pub fn extract_symbol(source: &str) -> Option<String> {
    DEF_LINE
        .captures(source)
        .map(|caps| caps[1].to_string())
}

pub fn synthesize(
    source: &str,
    inputs: &Map<String, Value>,
    strategy: BindingStrategy,
) -> HarnessedSource {
    let definition = DEF_LINE.captures(source);
    let symbol = definition.as_ref().map(|caps| caps[1].to_string());

    let arguments = match (strategy, &definition) {
        (BindingStrategy::Known, _) => bind_known(inputs),
        (BindingStrategy::Declared, Some(caps)) => {
            let signature_start = caps.get(0).map_or(source.len(), |m| m.end());
            let declared = declared_parameters(&source[signature_start..]);
            bind_declared(&declared, inputs)
        }
        (BindingStrategy::Declared, None) => Vec::new(),
    };

    let invocation = match &symbol {
        Some(name) => format!(
            "import json as _bd_json\nprint(_bd_json.dumps({}({})))",
            name,
            arguments.join(", ")
        ),
        None => MISSING_SYMBOL.to_string(),
    };

    HarnessedSource {
        source: append_harness(source, &invocation),
        invocation,
        symbol,
        arguments,
    }
}

fn bind_known(inputs: &Map<String, Value>) -> Vec<String> {
    KNOWN_PARAMETERS
        .iter()
        .filter_map(|name| inputs.get(*name))
        .map(render_literal)
        .collect()
}

/// Bind by declared name; unnamed parameters consume leftover inputs in
/// supplied order. After the first gap only keyword arguments are emitted.
fn bind_declared(declared: &[String], inputs: &Map<String, Value>) -> Vec<String> {
    let mut leftovers = inputs
        .iter()
        .filter(|(name, _)| !declared.iter().any(|d| d == *name))
        .map(|(_, value)| value);

    let mut arguments = Vec::new();
    let mut gap = false;

    for name in declared {
        match inputs.get(name) {
            Some(value) if gap => arguments.push(format!("{}={}", name, render_literal(value))),
            Some(value) => arguments.push(render_literal(value)),
            None if gap => {}
            None => match leftovers.next() {
                Some(value) => arguments.push(render_literal(value)),
                None => gap = true,
            },
        }
    }

    arguments
}

/// Parameter names from the text following `def name(`
fn declared_parameters(signature: &str) -> Vec<String> {
    let mut raw = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = signature.chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '#' => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth == 0 => break,
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 && !open_lambda(&current) => {
                raw.push(std::mem::take(&mut current))
            }
            _ => current.push(c),
        }
    }
    raw.push(current);

    raw.iter()
        .filter_map(|param| parameter_name(param))
        .collect()
}

/// True while a `lambda` in the default value has not reached its `:`,
/// so a comma still belongs to the lambda's own parameter list
fn open_lambda(param: &str) -> bool {
    let default = match param.split_once('=') {
        Some((_, default)) => default,
        None => return false,
    };

    let mut pending = 0usize;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut word = String::new();
    let mut chars = default.chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if c.is_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }
        if depth == 0 && word == "lambda" {
            pending += 1;
        }
        word.clear();

        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => pending = pending.saturating_sub(1),
            _ => {}
        }
    }
    if depth == 0 && word == "lambda" {
        pending += 1;
    }

    pending > 0
}

fn parameter_name(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.starts_with('*') || raw == "/" {
        return None;
    }

    let name: String = raw
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    match name.as_str() {
        "" | "self" | "cls" => None,
        _ => Some(name),
    }
}

/// Render a JSON value as an interpreter literal
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                if f.is_finite() && f.fract() == 0.0 {
                    // exact integer digits at any magnitude
                    format!("{:.0}", f)
                } else {
                    float_repr(f)
                }
            }
        }
        Value::String(s) => string_literal(s),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(render_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", string_literal(k), render_literal(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TWO_SUM: &str = "def twoSum(nums: list[int], target: int) -> list[int]:
    left, right = 0, len(nums) - 1
    while left < right:
        current_sum = nums[left] + nums[right]
        if current_sum == target:
            return [left, right]
        elif current_sum < target:
            left += 1
        else:
            right -= 1
    return [-1, -1]";

    fn inputs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_extract_symbol() {
        assert_eq!(extract_symbol(TWO_SUM).as_deref(), Some("twoSum"));
        assert_eq!(
            extract_symbol("import math\n\n\nasync def  fetch (x):\n    pass").as_deref(),
            Some("fetch")
        );
        assert_eq!(
            extract_symbol("class S:\n    def first(self, nums):\n        pass\ndef second():\n    pass").as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_extract_symbol_absent() {
        assert_eq!(extract_symbol("print('no functions here')"), None);
        assert_eq!(extract_symbol("# def commented(x):\nx = 1"), None);
        assert_eq!(extract_symbol("undefined(1)"), None);
    }

    #[test]
    fn test_known_names_fixed_order() {
        let case = inputs(json!({"target": 9, "nums": [2, 7, 11, 15], "unused": true}));
        let harness = synthesize(TWO_SUM, &case, BindingStrategy::Known);

        assert_eq!(harness.symbol.as_deref(), Some("twoSum"));
        assert_eq!(harness.arguments, vec!["[2, 7, 11, 15]", "9"]);
        assert!(harness.source.starts_with(TWO_SUM));
        assert!(harness
            .source
            .ends_with("\n\nimport json as _bd_json\nprint(_bd_json.dumps(twoSum([2, 7, 11, 15], 9)))\n"));
    }

    #[test]
    fn test_known_names_string_parameters() {
        let case = inputs(json!({"t": "ab", "s": "ba"}));
        let harness = synthesize("def isAnagram(s, t):\n    return sorted(s) == sorted(t)", &case, BindingStrategy::Known);

        assert_eq!(harness.arguments, vec!["\"ba\"", "\"ab\""]);
    }

    #[test]
    fn test_missing_symbol_raises_at_runtime() {
        let case = inputs(json!({"nums": [1]}));
        let harness = synthesize("this is not valid python syntax!!!", &case, BindingStrategy::Known);

        assert_eq!(harness.symbol, None);
        assert!(harness.source.ends_with(&format!("{}\n", MISSING_SYMBOL)));
        assert!(!harness.source.contains("_bd_json"));
    }

    #[test]
    fn test_render_literal() {
        assert_eq!(render_literal(&json!(null)), "None");
        assert_eq!(render_literal(&json!(true)), "True");
        assert_eq!(render_literal(&json!(false)), "False");
        assert_eq!(render_literal(&json!(-3)), "-3");
        assert_eq!(render_literal(&json!(2.0)), "2");
        assert_eq!(render_literal(&json!(2.5)), "2.5");
        assert_eq!(render_literal(&json!(1e20)), "100000000000000000000");
        assert_eq!(render_literal(&json!(-9.0e15)), "-9000000000000000");
        assert_eq!(render_literal(&json!(1.5e-7)), "1.5e-07");
        assert_eq!(render_literal(&json!("a\"b\\c\nd")), "\"a\\\"b\\\\c\\nd\"");
        assert_eq!(render_literal(&json!("\u{1}")), "\"\\x01\"");
        assert_eq!(render_literal(&json!([[1, 2], []])), "[[1, 2], []]");
        assert_eq!(render_literal(&json!({"a": [1], "b": null})), "{\"a\": [1], \"b\": None}");
    }

    #[test]
    fn test_declared_parameters_parsing() {
        let params = declared_parameters(
            "self, grid: Dict[str, Tuple[int, int]], k=\"a,b\", /, *args, flag: bool = (1, 2), **kwargs) -> int:",
        );
        assert_eq!(params, vec!["grid", "k", "flag"]);

        let multi = declared_parameters("\n    intervals,  # sorted by start\n    new_interval,\n):");
        assert_eq!(multi, vec!["intervals", "new_interval"]);

        assert!(declared_parameters("):").is_empty());
    }

    #[test]
    fn test_declared_parameters_skip_lambda_defaults() {
        let params = declared_parameters(
            "items, key=lambda a, b: a - b, cmp: Callable = lambda x: lambda y, z: x, reverse=False):",
        );
        assert_eq!(params, vec!["items", "key", "cmp", "reverse"]);

        let mapped = declared_parameters("pairs, pick=lambda p: {p[0]: p[1]}, n=2):");
        assert_eq!(mapped, vec!["pairs", "pick", "n"]);
    }

    #[test]
    fn test_invocation_kept_apart_from_source() {
        let case = inputs(json!({"nums": [3]}));
        let harness = synthesize("def f(nums):\n    return nums\n", &case, BindingStrategy::Known);

        assert_eq!(harness.invocation, "import json as _bd_json\nprint(_bd_json.dumps(f([3])))");
        assert_eq!(harness.source, append_harness("def f(nums):\n    return nums\n", &harness.invocation));
    }

    #[test]
    fn test_declared_binding_by_name() {
        let source = "def search(arr, x=0):\n    return arr.index(x)";
        let case = inputs(json!({"x": 5, "arr": [5]}));
        let harness = synthesize(source, &case, BindingStrategy::Declared);

        assert_eq!(harness.arguments, vec!["[5]", "5"]);
    }

    #[test]
    fn test_declared_binding_falls_back_to_supplied_order() {
        let source = "def merge(a, b):\n    return a + b";
        let case = inputs(json!({"first": [1], "second": [2]}));
        let harness = synthesize(source, &case, BindingStrategy::Declared);

        assert_eq!(harness.arguments, vec!["[1]", "[2]"]);
    }

    #[test]
    fn test_declared_binding_switches_to_keywords_after_gap() {
        let source = "def window(nums, size=3, *, step=1):\n    return nums";
        let case = inputs(json!({"nums": [1, 2], "step": 2}));
        let harness = synthesize(source, &case, BindingStrategy::Declared);

        assert_eq!(harness.arguments, vec!["[1, 2]", "step=2"]);
    }

    #[test]
    fn test_declared_without_definition() {
        let case = inputs(json!({"nums": [1]}));
        let harness = synthesize("print(1)", &case, BindingStrategy::Declared);

        assert!(harness.arguments.is_empty());
        assert_eq!(harness.symbol, None);
    }
}
