//! Synthesis context: the flat key/value configuration the stacks read.
//!
//! Sources, lowest precedence first: a `cdk.json`-style file, then
//! `key=value` assignments (command-line `-c` flags).

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

/// Errors raised while loading or reading context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("missing required context value: {key}")]
    Missing { key: String },

    #[error("invalid context assignment '{0}': expected key=value")]
    InvalidAssignment(String),

    #[error("context value for {key} must be a string, got {found}")]
    NotAString { key: String, found: String },

    #[error("context file {path}: {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("io error reading context: {0}")]
    Io(#[from] std::io::Error),

    #[error("context file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat context. String values are what the stacks read; other JSON values
/// (feature flags and the like) are kept so loading never fails on them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a context document.
    ///
    /// Accepts either `{"context": {...}}` (as in `cdk.json`) or a flat
    /// object. `null` entries are skipped. Non-string values load fine and
    /// only fail when a stack reads them.
    pub fn from_json_str(source: &str) -> Result<Self, ContextError> {
        let doc: Value = serde_json::from_str(source)?;
        let object = match doc.get("context") {
            Some(Value::Object(inner)) => inner.clone(),
            Some(other) => {
                return Err(ContextError::NotAString {
                    key: "context".to_string(),
                    found: json_type(other).to_string(),
                })
            }
            None => match doc {
                Value::Object(flat) => flat,
                other => {
                    return Err(ContextError::NotAString {
                        key: "<root>".to_string(),
                        found: json_type(&other).to_string(),
                    })
                }
            },
        };

        let values = object
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect();
        Ok(Context { values })
    }

    pub fn from_file(path: &Path) -> Result<Self, ContextError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content).map_err(|e| ContextError::InvalidFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), Value::String(value.into()));
        self
    }

    /// Apply a `key=value` assignment. The value may itself contain `=`.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), ContextError> {
        match assignment.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                self.set(key.trim(), value);
                Ok(())
            }
            _ => Err(ContextError::InvalidAssignment(assignment.to_string())),
        }
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(&mut self, other: Context) -> &mut Self {
        self.values.extend(other.values);
        self
    }

    /// String value for `key`; `None` when unset or not a string.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Whether `key` holds any value, string or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value for a required key. Blank counts as missing.
    pub fn require(&self, key: &str) -> Result<String, ContextError> {
        self.optional(key)?.ok_or_else(|| ContextError::Missing {
            key: key.to_string(),
        })
    }

    /// Value for an optional key. Blank counts as unset; a non-string value
    /// is an error.
    pub fn optional(&self, key: &str) -> Result<Option<String>, ContextError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Some(other) => Err(ContextError::NotAString {
                key: key.to_string(),
                found: json_type(other).to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
