//! Field classification.
//!
//! Maps a declared value type to the RediSearch field kind it is indexed as
//! whenever a field does not declare its kind explicitly:
//!
//! ```text
//! i8..u64, f32, f64, decimal, date/time, duration  → NUMERIC
//! String                                           → TEXT
//! bool, enums, structs, identifiers                → TAG
//! ```
//!
//! Wrapper types (`Option<T>` and other single-parameter generics) are
//! unwrapped to their innermost type before classification.

use chrono::{DateTime, Duration, Utc};

/// Declared value type of a model field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    DateTime,
    Duration,
    String,
    Bool,
    /// Fieldless enum stored by discriminant.
    Enum(&'static str),
    /// Composite value (struct, list, map) stored opaquely.
    Struct(&'static str),
    /// Identifier type (uuid, ulid, object id).
    Id,
    /// Single-parameter wrapper (`Option<T>`, `Box<T>`, ...).
    Wrapper(Box<ValueType>),
}

/// Resolved index kind of a field. Never "auto": see `IndexKind` for the
/// declaration-side enum that still allows inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Numeric,
    Text,
    Tag,
}

impl FieldKind {
    /// RediSearch schema keyword for this kind.
    pub fn schema_keyword(self) -> &'static str {
        match self {
            FieldKind::Numeric => "NUMERIC",
            FieldKind::Text => "TEXT",
            FieldKind::Tag => "TAG",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Numeric => write!(f, "Numeric"),
            FieldKind::Text => write!(f, "Text"),
            FieldKind::Tag => write!(f, "Tag"),
        }
    }
}

impl ValueType {
    /// Strip wrapper layers down to the innermost declared type.
    pub fn unwrap_inner(&self) -> &ValueType {
        let mut current = self;
        while let ValueType::Wrapper(inner) = current {
            current = inner;
        }
        current
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.unwrap_inner(), ValueType::Bool)
    }

    /// Infer the index kind for this value type.
    pub fn classify(&self) -> FieldKind {
        match self.unwrap_inner() {
            ValueType::I8
            | ValueType::I16
            | ValueType::I32
            | ValueType::I64
            | ValueType::U8
            | ValueType::U16
            | ValueType::U32
            | ValueType::U64
            | ValueType::F32
            | ValueType::F64
            | ValueType::Decimal
            | ValueType::DateTime
            | ValueType::Duration => FieldKind::Numeric,
            ValueType::String => FieldKind::Text,
            _ => FieldKind::Tag,
        }
    }
}

/// Runtime value used on the right-hand side of predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Enum { name: String, discriminant: i64 },
    DateTime(DateTime<Utc>),
    Duration(Duration),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Enum { name, .. } => write!(f, "{}", name),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Duration(d) => write!(f, "{}s", d.num_seconds()),
        }
    }
}

/// Rust types that can appear as model fields and predicate operands.
pub trait FieldValue {
    fn value_type() -> ValueType;
    fn into_value(self) -> Value;
}

/// Marker for field types that support range comparisons.
pub trait Ordered: FieldValue {}

macro_rules! int_field_value {
    ($($ty:ty => $vt:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn value_type() -> ValueType { ValueType::$vt }
                fn into_value(self) -> Value { Value::Int(i64::from(self)) }
            }
            impl Ordered for $ty {}
        )*
    };
}

int_field_value!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, u8 => U8, u16 => U16, u32 => U32);

impl FieldValue for u64 {
    fn value_type() -> ValueType {
        ValueType::U64
    }
    fn into_value(self) -> Value {
        Value::UInt(self)
    }
}
impl Ordered for u64 {}

impl FieldValue for f32 {
    fn value_type() -> ValueType {
        ValueType::F32
    }
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}
impl Ordered for f32 {}

impl FieldValue for f64 {
    fn value_type() -> ValueType {
        ValueType::F64
    }
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}
impl Ordered for f64 {}

impl FieldValue for String {
    fn value_type() -> ValueType {
        ValueType::String
    }
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl FieldValue for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FieldValue for DateTime<Utc> {
    fn value_type() -> ValueType {
        ValueType::DateTime
    }
    fn into_value(self) -> Value {
        Value::DateTime(self)
    }
}
impl Ordered for DateTime<Utc> {}

impl FieldValue for Duration {
    fn value_type() -> ValueType {
        ValueType::Duration
    }
    fn into_value(self) -> Value {
        Value::Duration(self)
    }
}
impl Ordered for Duration {}

impl<T: FieldValue> FieldValue for Option<T> {
    fn value_type() -> ValueType {
        ValueType::Wrapper(Box::new(T::value_type()))
    }
    fn into_value(self) -> Value {
        self.map(FieldValue::into_value).unwrap_or(Value::Null)
    }
}
impl<T: Ordered> Ordered for Option<T> {}

/// Implement [`FieldValue`] for a fieldless enum, stored by discriminant.
///
/// ```
/// #[derive(Debug, Clone, Copy)]
/// enum Rarity { Common = 0, Rare = 1 }
/// hashmodel::index_enum!(Rarity);
/// ```
#[macro_export]
macro_rules! index_enum {
    ($ty:ty) => {
        impl $crate::model::FieldValue for $ty {
            fn value_type() -> $crate::model::ValueType {
                $crate::model::ValueType::Enum(stringify!($ty))
            }
            fn into_value(self) -> $crate::model::Value {
                $crate::model::Value::Enum {
                    name: format!("{:?}", self),
                    discriminant: self as i64,
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_types_classify_numeric() {
        for vt in [
            ValueType::I8,
            ValueType::I32,
            ValueType::U64,
            ValueType::F32,
            ValueType::F64,
            ValueType::Decimal,
            ValueType::DateTime,
            ValueType::Duration,
        ] {
            assert_eq!(vt.classify(), FieldKind::Numeric, "{:?}", vt);
        }
    }

    #[test]
    fn test_string_classifies_text() {
        assert_eq!(ValueType::String.classify(), FieldKind::Text);
    }

    #[test]
    fn test_everything_else_classifies_tag() {
        assert_eq!(ValueType::Bool.classify(), FieldKind::Tag);
        assert_eq!(ValueType::Enum("Rarity").classify(), FieldKind::Tag);
        assert_eq!(ValueType::Struct("Address").classify(), FieldKind::Tag);
        assert_eq!(ValueType::Id.classify(), FieldKind::Tag);
    }

    #[test]
    fn test_wrapper_is_unwrapped() {
        let vt = ValueType::Wrapper(Box::new(ValueType::Wrapper(Box::new(ValueType::I32))));
        assert_eq!(vt.classify(), FieldKind::Numeric);
        assert_eq!(<Option<String>>::value_type().classify(), FieldKind::Text);
        assert!(<Option<bool>>::value_type().is_bool());
    }

    #[test]
    fn test_option_none_is_null() {
        assert_eq!(None::<i32>.into_value(), Value::Null);
        assert_eq!(Some(7i32).into_value(), Value::Int(7));
    }

    #[derive(Debug, Clone, Copy)]
    #[allow(dead_code)]
    enum Rarity {
        Common = 0,
        Rare = 3,
    }
    crate::index_enum!(Rarity);

    #[test]
    fn test_enum_keeps_discriminant() {
        assert_eq!(Rarity::value_type().classify(), FieldKind::Tag);
        match Rarity::Rare.into_value() {
            Value::Enum { name, discriminant } => {
                assert_eq!(name, "Rare");
                assert_eq!(discriminant, 3);
            }
            other => panic!("Expected enum value, got {:?}", other),
        }
    }
}
