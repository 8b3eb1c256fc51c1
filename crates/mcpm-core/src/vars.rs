//! `${name}` placeholder substitution.
//!
//! This is plain text replacement, not a template language: a placeholder
//! whose name has no value is left exactly as written, and substituted text
//! is never scanned again.

use std::collections::BTreeMap;

use serde_json::Value;

/// User-supplied values keyed by input name.
pub type InputValues = BTreeMap<String, String>;

/// Replace every `${name}` in `text` that has a value in `values`.
pub fn substitute(text: &str, values: &InputValues) -> String {
    if values.is_empty() || !text.contains("${") {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match values.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Apply [`substitute`] to every string value inside a JSON document.
///
/// Object keys are left untouched.
pub fn substitute_json(value: &mut Value, values: &InputValues) {
    if values.is_empty() {
        return;
    }
    match value {
        Value::String(s) => {
            let replaced = substitute(s, values);
            if replaced != *s {
                *s = replaced;
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_json(item, values);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                substitute_json(item, values);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, &str)]) -> InputValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_known_placeholders() {
        let v = values(&[("TOKEN", "secret123"), ("PORT", "8080")]);
        assert_eq!(
            substitute("serve --token ${TOKEN} --port=${PORT}", &v),
            "serve --token secret123 --port=8080"
        );
    }

    #[test]
    fn leaves_unknown_placeholders_verbatim() {
        let v = values(&[("TOKEN", "x")]);
        assert_eq!(substitute("${MISSING}/${TOKEN}", &v), "${MISSING}/x");
    }

    #[test]
    fn unterminated_placeholder_is_kept() {
        let v = values(&[("A", "1")]);
        assert_eq!(substitute("echo ${A} ${B", &v), "echo 1 ${B");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let v = values(&[("A", "${B}"), ("B", "nope")]);
        assert_eq!(substitute("${A}", &v), "${B}");
    }

    #[test]
    fn substitutes_nested_json_strings_only() {
        let v = values(&[("TOKEN", "abc"), ("HOST", "localhost")]);
        let mut doc = json!({
            "command": "server",
            "args": ["--token", "${TOKEN}"],
            "env": {"API_HOST": "${HOST}", "${TOKEN}": 1},
            "port": 3000
        });

        substitute_json(&mut doc, &v);

        assert_eq!(doc["args"][1], "abc");
        assert_eq!(doc["env"]["API_HOST"], "localhost");
        assert!(doc["env"].get("${TOKEN}").is_some());
        assert_eq!(doc["port"], 3000);
    }

    #[test]
    fn values_with_quotes_stay_valid_json() {
        let v = values(&[("MSG", r#"say "hi""#)]);
        let mut doc = json!({"args": ["${MSG}"]});
        substitute_json(&mut doc, &v);
        let text = serde_json::to_string(&doc).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["args"][0], r#"say "hi""#);
    }
}
