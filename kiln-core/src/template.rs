use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::collections::HashMap;

const FORM_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'*');

/// Result of formatting a `{name}` template against a value mapping.
#[derive(Debug, Clone, Default)]
pub struct FormatOutcome {
    pub text: String,
    /// Field names that were found in the mapping and substituted, in the
    /// order they first appear in the template.
    pub substituted_fields: Vec<String>,
    /// Field names left as literal `{name}` because no value was found.
    pub not_substituted_fields: Vec<String>,
}

/// `{name}` substitution that leaves unknown names in place instead of
/// failing. Supports both named (`{id}`) and positional (`{0}`)
/// fields; substituted values are percent-encoded form-style (`+` for
/// space).
pub struct PartialTemplateFormatter;

impl PartialTemplateFormatter {
    pub fn format(
        template: &str,
        named: &HashMap<String, Value>,
        positional: &[Value],
    ) -> FormatOutcome {
        let mut out = FormatOutcome::default();
        let chars: Vec<char> = template.chars().collect();
        let mut i = 0usize;

        while i < chars.len() {
            let c = chars[i];
            if c == '{' {
                if chars.get(i + 1) == Some(&'{') {
                    out.text.push('{');
                    i += 2;
                    continue;
                }
                if let Some(rel_end) = chars[i + 1..].iter().position(|&ch| ch == '}') {
                    let end = i + 1 + rel_end;
                    let field_name: String = chars[i + 1..end].iter().collect();
                    let value = if let Ok(idx) = field_name.parse::<usize>() {
                        positional.get(idx)
                    } else {
                        named.get(&field_name)
                    };
                    match value {
                        Some(v) => {
                            out.text.push_str(&form_encode_value(v));
                            if !out.substituted_fields.contains(&field_name) {
                                out.substituted_fields.push(field_name);
                            }
                        }
                        None => {
                            out.text.push('{');
                            out.text.push_str(&field_name);
                            out.text.push('}');
                            if !out.not_substituted_fields.contains(&field_name) {
                                out.not_substituted_fields.push(field_name);
                            }
                        }
                    }
                    i = end + 1;
                    continue;
                } else {
                    out.text.push('{');
                    i += 1;
                    continue;
                }
            } else if c == '}' && chars.get(i + 1) == Some(&'}') {
                out.text.push('}');
                i += 2;
                continue;
            } else {
                out.text.push(c);
                i += 1;
            }
        }

        out
    }
}

fn form_encode_value(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    utf8_percent_encode(&raw, FORM_SAFE)
        .to_string()
        .replace("%20", "+")
}
