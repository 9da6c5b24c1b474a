//! Template digests.
//!
//! A stack's rendered template is reduced to one canonical string and hashed
//! with SHA-256, so two synthesis runs over the same inputs can be compared
//! by digest alone. Canonical form: object keys sorted by UTF-16 code units,
//! compact separators, integer-valued floats written as integers.

use crate::domain::error::{Result, SynthError};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

/// Canonical compact form of `stack`'s template.
///
/// Fails with [`SynthError::NonCanonical`] naming the stack and the JSON
/// path of the first value that has no canonical form.
pub fn canonical_template(stack: &str, template: &Value) -> Result<String> {
    let mut path = Vec::new();
    let canonical = canonicalize(template, &mut path).map_err(|reason| {
        SynthError::NonCanonical {
            stack: stack.to_string(),
            path: display_path(&path),
            reason,
        }
    })?;
    Ok(serde_json::to_string(&canonical)?)
}

/// SHA-256 hex digest of [`canonical_template`].
pub fn template_digest(stack: &str, template: &Value) -> Result<String> {
    let canonical = canonical_template(stack, template)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Sort keys and normalize numbers in one walk. On error `path` is left
/// pointing at the offending value.
fn canonicalize(value: &Value, path: &mut Vec<String>) -> std::result::Result<Value, String> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            let mut sorted = Map::new();
            for key in keys {
                path.push(key.clone());
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()], path)?);
                path.pop();
            }
            Ok(Value::Object(sorted))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                out.push(canonicalize(item, path)?);
                path.pop();
            }
            Ok(Value::Array(out))
        }
        Value::Number(n) if !(n.is_i64() || n.is_u64()) => {
            let f = n.as_f64().ok_or_else(|| format!("unrepresentable number {}", n))?;
            if !f.is_finite() {
                return Err("non-finite number".to_string());
            }
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(Value::Number(Number::from(f as i64)))
            } else {
                Ok(Value::Number(n.clone()))
            }
        }
        other => Ok(other.clone()),
    }
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_change_digest() {
        let a = json!({ "Type": "AWS::SNS::Topic", "Properties": { "b": 1, "a": 2 } });
        let b = json!({ "Properties": { "a": 2, "b": 1 }, "Type": "AWS::SNS::Topic" });
        assert_eq!(
            template_digest("S", &a).expect("digest a"),
            template_digest("S", &b).expect("digest b")
        );
        assert_eq!(
            canonical_template("S", &a).expect("canonical"),
            r#"{"Properties":{"a":2,"b":1},"Type":"AWS::SNS::Topic"}"#
        );
    }

    #[test]
    fn test_alert_state_order_is_significant() {
        let a = json!({ "state": ["FAILED", "SUCCEEDED", "STOPPED"] });
        let b = json!({ "state": ["STOPPED", "FAILED", "SUCCEEDED"] });
        assert_ne!(
            template_digest("S", &a).expect("digest a"),
            template_digest("S", &b).expect("digest b")
        );
    }

    #[test]
    fn test_integer_valued_float_written_as_integer() {
        let template = json!({ "Resources": { "Q": { "Properties": { "Timeout": 30.0 } } } });
        assert_eq!(
            canonical_template("S", &template).expect("canonical"),
            r#"{"Resources":{"Q":{"Properties":{"Timeout":30}}}}"#
        );
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        let digest = template_digest("S", &json!({ "Resources": {} })).expect("digest");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(
            digest,
            template_digest("S", &json!({ "Resources": { "B": {} } })).expect("digest")
        );
    }

    #[test]
    fn test_path_display() {
        assert_eq!(display_path(&[]), "<root>");
        let path = ["Resources".to_string(), "Topic".to_string(), "0".to_string()];
        assert_eq!(display_path(&path), "Resources.Topic.0");
    }
}
