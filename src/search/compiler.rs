//! Predicate Compiler
//!
//! Lowers a [`Predicate`] tree to RediSearch query text, choosing syntax per
//! the field's resolved index kind.
//!
//! # Lowering
//!
//! ```text
//! Numeric   x == v   → @x:[v v]          x != v  → -@x:[v v]
//!           x >  v   → @x:[v+0.001 +inf] x >= v  → @x:[v +inf]
//!           x <  v   → @x:[-inf v-0.001] x <= v  → @x:[-inf v]
//! Text      x == v   → @x:v              x != v  → -@x:v
//! Tag       x == v   → @x:{v}            x != v  → -@x:{v}
//! Text      Contains → @x:*v*  StartsWith → @x:v*   EndsWith → @x:*v
//! Tag       Contains → @x:{*v*} StartsWith → @x:{v*} EndsWith → @x:{*v}
//! a && b             → (a b)
//! a || b             → (a | b)
//! !a                 → -(a)              (only when `a` is field-scoped)
//! bool field         → @x:{True}
//! ```
//!
//! Right-hand values are coerced before dispatch: timestamps become Unix
//! seconds, durations whole seconds, enums their discriminant. Literals are
//! escaped exactly once, after coercion.
//!
//! Numeric ranges are closed intervals, so strict bounds are approximated with
//! [`NUMERIC_EPSILON`].

use thiserror::Error;

use super::predicate::{CompareOp, Operand, Predicate, StringMethod};
use crate::model::{FieldDescriptor, FieldKind, ModelDescriptor, Value, ValueType};

/// Offset applied to strict numeric bounds.
pub const NUMERIC_EPSILON: f64 = 0.001;

/// Characters RediSearch treats as query syntax. Whitespace is reserved too.
pub const RESERVED_CHARS: &[char] = &[
    ',', '.', '<', '>', '{', '}', '[', ']', '"', '\'', ':', ';', '!', '@', '#', '$', '%', '^',
    '&', '*', '(', ')', '-', '+', '=', '~', '|', '/', '\\', '?', '`',
];

const FIELD_MARKER: char = '@';

/// Predicate misuse. Always surfaced to the caller; never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Unknown field '{field}' on index '{index}' in `{fragment}`")]
    UnknownField {
        index: String,
        field: String,
        fragment: String,
    },
    #[error("Operator {op} is not supported for {kind} field '{field}' in `{fragment}`")]
    UnsupportedOperator {
        op: CompareOp,
        kind: FieldKind,
        field: String,
        fragment: String,
    },
    #[error("Method {method} is not supported on {kind} field '{field}' in `{fragment}`")]
    UnsupportedMethod {
        method: StringMethod,
        kind: FieldKind,
        field: String,
        fragment: String,
    },
    #[error("Value {value} cannot be matched against {kind} field '{field}' in `{fragment}`")]
    UnsupportedValue {
        value: String,
        kind: FieldKind,
        field: String,
        fragment: String,
    },
    #[error("Null comparison value in `{fragment}`")]
    NullValue { fragment: String },
    #[error("Unsupported expression `{fragment}`: {reason}")]
    UnsupportedExpression { fragment: String, reason: String },
    #[error("Sort field '{field}' is not indexed on '{index}'")]
    UnindexedSortField { index: String, field: String },
}

/// Compiles predicates against one model's descriptor.
pub struct PredicateCompiler<'a> {
    descriptor: &'a ModelDescriptor,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(descriptor: &'a ModelDescriptor) -> Self {
        Self { descriptor }
    }

    /// Compile one predicate to a query clause.
    pub fn compile(&self, predicate: &Predicate) -> Result<String, CompileError> {
        self.compile_node(predicate)
    }

    fn compile_node(&self, node: &Predicate) -> Result<String, CompileError> {
        match node {
            Predicate::Compare { field, op, value } => {
                let desc = self.resolve_field(field, node)?;
                let scalar = self.evaluate(value, node)?;
                self.compile_compare(desc, *op, scalar, node)
            }
            Predicate::And(left, right) => {
                Ok(format!("({} {})", self.compile_node(left)?, self.compile_node(right)?))
            }
            Predicate::Or(left, right) => {
                Ok(format!("({} | {})", self.compile_node(left)?, self.compile_node(right)?))
            }
            Predicate::Not(inner) => {
                let clause = self.compile_node(inner)?;
                if has_field_marker(&clause) {
                    Ok(format!("-({})", clause))
                } else {
                    Ok(clause)
                }
            }
            Predicate::Call { field, method, arg } => {
                let desc = self.resolve_field(field, node)?;
                let scalar = self.evaluate(arg, node)?;
                self.compile_call(desc, *method, scalar, node)
            }
            Predicate::Member(field) => {
                let desc = self.resolve_field(field, node)?;
                if !desc.value_type.is_bool() {
                    return Err(CompileError::UnsupportedExpression {
                        fragment: node.to_string(),
                        reason: "bare member access requires a boolean field".to_string(),
                    });
                }
                self.compile_compare(desc, CompareOp::Eq, Scalar::Bool(true), node)
            }
            Predicate::Constant(value) => {
                let token = match coerce(value.clone()) {
                    None => {
                        return Err(CompileError::NullValue {
                            fragment: node.to_string(),
                        })
                    }
                    Some(scalar) => escape_value(&scalar.token()),
                };
                if token.is_empty() {
                    return Err(CompileError::UnsupportedExpression {
                        fragment: node.to_string(),
                        reason: "empty constant".to_string(),
                    });
                }
                Ok(token)
            }
        }
    }

    fn compile_compare(
        &self,
        desc: &FieldDescriptor,
        op: CompareOp,
        scalar: Scalar,
        node: &Predicate,
    ) -> Result<String, CompileError> {
        let name = &desc.name;
        match desc.kind {
            FieldKind::Numeric => {
                let number = match scalar {
                    Scalar::Number(n) => n,
                    Scalar::Bool(b) => Number::Int(i64::from(b)),
                    Scalar::Text(text) => return Err(unsupported_value(desc, format!("{:?}", text), node)),
                };
                if !number.is_finite() {
                    return Err(unsupported_value(desc, number.render(), node));
                }
                let v = number.render();
                let clause = match op {
                    CompareOp::Eq | CompareOp::Ne => format!("@{}:[{} {}]", name, v, v),
                    CompareOp::Gt => {
                        format!("@{}:[{} +inf]", name, number.offset(NUMERIC_EPSILON).render())
                    }
                    CompareOp::Ge => format!("@{}:[{} +inf]", name, v),
                    CompareOp::Lt => {
                        format!("@{}:[-inf {}]", name, number.offset(-NUMERIC_EPSILON).render())
                    }
                    CompareOp::Le => format!("@{}:[-inf {}]", name, v),
                };
                Ok(negate_if(op == CompareOp::Ne, clause))
            }
            FieldKind::Text | FieldKind::Tag => {
                if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                    return Err(CompileError::UnsupportedOperator {
                        op,
                        kind: desc.kind,
                        field: name.clone(),
                        fragment: node.to_string(),
                    });
                }
                let raw = scalar.token();
                if raw.is_empty() {
                    return Err(unsupported_value(desc, "\"\"".to_string(), node));
                }
                let token = escape_value(&raw);
                let clause = if desc.kind == FieldKind::Tag {
                    format!("@{}:{{{}}}", name, token)
                } else {
                    format!("@{}:{}", name, token)
                };
                Ok(negate_if(op == CompareOp::Ne, clause))
            }
        }
    }

    fn compile_call(
        &self,
        desc: &FieldDescriptor,
        method: StringMethod,
        scalar: Scalar,
        node: &Predicate,
    ) -> Result<String, CompileError> {
        let unsupported = || CompileError::UnsupportedMethod {
            method,
            kind: desc.kind,
            field: desc.name.clone(),
            fragment: node.to_string(),
        };

        if *desc.value_type.unwrap_inner() != ValueType::String {
            return Err(unsupported());
        }

        let raw = scalar.token();
        if raw.is_empty() {
            return Err(unsupported_value(desc, "\"\"".to_string(), node));
        }
        let token = escape_value(&raw);
        let pattern = match method {
            StringMethod::Contains => format!("*{}*", token),
            StringMethod::StartsWith => format!("{}*", token),
            StringMethod::EndsWith => format!("*{}", token),
        };

        match desc.kind {
            FieldKind::Text => Ok(format!("@{}:{}", desc.name, pattern)),
            FieldKind::Tag => Ok(format!("@{}:{{{}}}", desc.name, pattern)),
            FieldKind::Numeric => Err(unsupported()),
        }
    }

    fn resolve_field(&self, field: &str, node: &Predicate) -> Result<&'a FieldDescriptor, CompileError> {
        self.descriptor
            .field(field)
            .ok_or_else(|| CompileError::UnknownField {
                index: self.descriptor.index_name.clone(),
                field: field.to_string(),
                fragment: node.to_string(),
            })
    }

    /// Evaluate a right-hand operand to a coerced scalar.
    fn evaluate(&self, operand: &Operand, node: &Predicate) -> Result<Scalar, CompileError> {
        let value = match operand {
            Operand::Value(v) => v.clone(),
            Operand::Eval(f) => f(),
            Operand::Field(other) => {
                return Err(CompileError::UnsupportedExpression {
                    fragment: node.to_string(),
                    reason: format!("right-hand side references model field '{}'", other),
                })
            }
        };
        coerce(value).ok_or_else(|| CompileError::NullValue {
            fragment: node.to_string(),
        })
    }

    /// Validate a sort field: it must be indexed.
    pub fn check_sort_field(&self, field: &str) -> Result<(), CompileError> {
        match self.descriptor.indexed_field(field) {
            Some(_) => Ok(()),
            None => Err(CompileError::UnindexedSortField {
                index: self.descriptor.index_name.clone(),
                field: field.to_string(),
            }),
        }
    }

    /// Validate a returned field: it must be declared on the model.
    pub fn check_declared_field(&self, field: &str) -> Result<(), CompileError> {
        match self.descriptor.field(field) {
            Some(_) => Ok(()),
            None => Err(CompileError::UnknownField {
                index: self.descriptor.index_name.clone(),
                field: field.to_string(),
                fragment: format!("RETURN {}", field),
            }),
        }
    }
}

/// Numeric literal, kept exact for integers.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::UInt(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    fn is_finite(self) -> bool {
        match self {
            Number::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    fn offset(self, delta: f64) -> Number {
        Number::Float(self.as_f64() + delta)
    }

    fn render(self) -> String {
        match self {
            Number::Int(v) => v.to_string(),
            Number::UInt(v) => v.to_string(),
            Number::Float(v) if v.is_infinite() => {
                if v > 0.0 { "+inf".to_string() } else { "-inf".to_string() }
            }
            Number::Float(v) => v.to_string(),
        }
    }
}

/// Coerced right-hand value.
#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl Scalar {
    /// Unescaped token text.
    fn token(&self) -> String {
        match self {
            Scalar::Bool(true) => "True".to_string(),
            Scalar::Bool(false) => "False".to_string(),
            Scalar::Number(n) => n.render(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

fn coerce(value: Value) -> Option<Scalar> {
    let scalar = match value {
        Value::Null => return None,
        Value::Bool(b) => Scalar::Bool(b),
        Value::Int(v) => Scalar::Number(Number::Int(v)),
        Value::UInt(v) => Scalar::Number(Number::UInt(v)),
        Value::Float(v) => Scalar::Number(Number::Float(v)),
        Value::Text(s) => Scalar::Text(s),
        Value::Enum { discriminant, .. } => Scalar::Number(Number::Int(discriminant)),
        Value::DateTime(dt) => Scalar::Number(Number::Int(dt.timestamp())),
        Value::Duration(d) => Scalar::Number(Number::Int(d.num_seconds())),
    };
    Some(scalar)
}

fn unsupported_value(desc: &FieldDescriptor, value: String, node: &Predicate) -> CompileError {
    CompileError::UnsupportedValue {
        value,
        kind: desc.kind,
        field: desc.name.clone(),
        fragment: node.to_string(),
    }
}

fn negate_if(negate: bool, clause: String) -> String {
    if negate {
        format!("-{}", clause)
    } else {
        clause
    }
}

/// True if the clause contains an unescaped field marker.
fn has_field_marker(clause: &str) -> bool {
    let mut chars = clause.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            FIELD_MARKER => return true,
            _ => {}
        }
    }
    false
}

/// Backslash-escape every reserved character and whitespace.
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_whitespace() || RESERVED_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Inverse of [`escape_value`].
pub fn unescape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
