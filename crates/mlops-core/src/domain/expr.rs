//! Template value expressions.
//!
//! An [`Expr`] is either a literal string or something the provider resolves
//! at deploy time: a reference to another resource in the same graph, an
//! attribute of one, a pseudo parameter, or a concatenation of those.

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use super::resource::LogicalId;

/// Provider-resolved pseudo parameters. Never treated as graph references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pseudo {
    AccountId,
    Region,
    Partition,
}

impl Pseudo {
    pub fn name(&self) -> &'static str {
        match self {
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::Region => "AWS::Region",
            Pseudo::Partition => "AWS::Partition",
        }
    }
}

/// A template value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(String),
    Ref(LogicalId),
    GetAtt(LogicalId, String),
    Pseudo(Pseudo),
    /// Concatenation with an empty delimiter.
    Join(Vec<Expr>),
}

impl Expr {
    pub fn lit(value: impl Into<String>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn reference(id: &LogicalId) -> Self {
        Expr::Ref(id.clone())
    }

    pub fn get_att(id: &LogicalId, attribute: impl Into<String>) -> Self {
        Expr::GetAtt(id.clone(), attribute.into())
    }

    pub fn join(parts: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Join(parts.into_iter().collect())
    }

    pub fn region() -> Self {
        Expr::Pseudo(Pseudo::Region)
    }

    pub fn account() -> Self {
        Expr::Pseudo(Pseudo::AccountId)
    }

    pub fn partition() -> Self {
        Expr::Pseudo(Pseudo::Partition)
    }

    /// The literal text, if this expression needs no deploy-time resolution.
    pub fn as_literal(&self) -> Option<String> {
        match self {
            Expr::Literal(s) => Some(s.clone()),
            Expr::Join(parts) => parts
                .iter()
                .map(Expr::as_literal)
                .collect::<Option<Vec<_>>>()
                .map(|chunks| chunks.concat()),
            _ => None,
        }
    }

    /// Logical ids this expression points at, in order of appearance.
    pub fn references(&self) -> Vec<&LogicalId> {
        match self {
            Expr::Ref(id) | Expr::GetAtt(id, _) => vec![id],
            Expr::Join(parts) => parts.iter().flat_map(Expr::references).collect(),
            Expr::Literal(_) | Expr::Pseudo(_) => Vec::new(),
        }
    }

    /// Render to the template's JSON encoding.
    ///
    /// Joins collapse adjacent literals; a join that is entirely literal
    /// renders as a plain string.
    pub fn to_json(&self) -> Value {
        match self {
            Expr::Literal(s) => Value::String(s.clone()),
            Expr::Ref(id) => json!({ "Ref": id.as_str() }),
            Expr::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id.as_str(), attr] }),
            Expr::Pseudo(p) => json!({ "Ref": p.name() }),
            Expr::Join(parts) => {
                if let Some(text) = self.as_literal() {
                    return Value::String(text);
                }
                let mut rendered: Vec<Value> = Vec::new();
                let mut pending = String::new();
                for part in flatten(parts) {
                    match part {
                        Expr::Literal(s) => pending.push_str(s),
                        other => {
                            if !pending.is_empty() {
                                rendered.push(Value::String(std::mem::take(&mut pending)));
                            }
                            rendered.push(other.to_json());
                        }
                    }
                }
                if !pending.is_empty() {
                    rendered.push(Value::String(pending));
                }
                json!({ "Fn::Join": ["", rendered] })
            }
        }
    }
}

fn flatten(parts: &[Expr]) -> Vec<&Expr> {
    parts
        .iter()
        .flat_map(|p| match p {
            Expr::Join(inner) => flatten(inner),
            other => vec![other],
        })
        .collect()
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<Expr> for Value {
    fn from(expr: Expr) -> Self {
        expr.to_json()
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::lit(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(value)
    }
}
