// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Predicate AST and typed builder.
//!
//! Callers describe filters against a model's fields through typed [`Field`]
//! handles; the result is a [`Filter`] that wraps the untyped [`Predicate`]
//! tree the compiler lowers to RediSearch syntax.
//!
//! # Example
//!
//! ```rust
//! use hashmodel::model::{IndexKind, Indexed, Model, ModelSchema};
//! use hashmodel::search::Field;
//!
//! struct Sample;
//!
//! impl Model for Sample {
//!     const INDEX_NAME: &'static str = "samples";
//!     fn schema() -> ModelSchema {
//!         ModelSchema::new::<Self>()
//!             .indexed_with::<String>("Username", Indexed::kind(IndexKind::Tag))
//!             .indexed::<i32>("Number")
//!     }
//! }
//!
//! impl Sample {
//!     const USERNAME: Field<Sample, String> = Field::new("Username");
//!     const NUMBER: Field<Sample, i32> = Field::new("Number");
//! }
//!
//! let filter = Sample::NUMBER.eq(5) & Sample::USERNAME.starts_with("1");
//! assert_eq!(filter.to_string(), r#"(Number == 5 && Username.StartsWith("1"))"#);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use crate::model::{FieldValue, Model, Ordered, Value};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        f.write_str(op)
    }
}

/// String method applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMethod {
    Contains,
    StartsWith,
    EndsWith,
}

impl fmt::Display for StringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StringMethod::Contains => "Contains",
            StringMethod::StartsWith => "StartsWith",
            StringMethod::EndsWith => "EndsWith",
        };
        f.write_str(name)
    }
}

/// Right-hand side of a comparison or method call.
#[derive(Clone)]
pub enum Operand {
    /// Literal value.
    Value(Value),
    /// Evaluated once, at compile time (e.g. "now").
    Eval(Arc<dyn Fn() -> Value + Send + Sync>),
    /// Reference to another field of the same model. Never compilable.
    Field(String),
}

impl Operand {
    pub fn eval<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Operand::Eval(Arc::new(f))
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Operand::Eval(_) => f.write_str("Eval(..)"),
            Operand::Field(name) => f.debug_tuple("Field").field(name).finish(),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{}", v),
            Operand::Eval(_) => f.write_str("<deferred>"),
            Operand::Field(name) => write!(f, "model.{}", name),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

/// Predicate AST node.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `field <op> value`
    Compare { field: String, op: CompareOp, value: Operand },
    /// `left && right`
    And(Box<Predicate>, Box<Predicate>),
    /// `left || right`
    Or(Box<Predicate>, Box<Predicate>),
    /// `!inner`
    Not(Box<Predicate>),
    /// `field.Method(arg)`
    Call { field: String, method: StringMethod, arg: Operand },
    /// Bare boolean field access: `field`
    Member(String),
    /// Bare constant, searched as a free-text term.
    Constant(Value),
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Operand>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn call(field: impl Into<String>, method: StringMethod, arg: impl Into<Operand>) -> Self {
        Predicate::Call {
            field: field.into(),
            method,
            arg: arg.into(),
        }
    }

    pub fn member(field: impl Into<String>) -> Self {
        Predicate::Member(field.into())
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { field, op, value } => write!(f, "{} {} {}", field, op, value),
            Predicate::And(l, r) => write!(f, "({} && {})", l, r),
            Predicate::Or(l, r) => write!(f, "({} || {})", l, r),
            Predicate::Not(inner) => write!(f, "!{}", inner),
            Predicate::Call { field, method, arg } => write!(f, "{}.{}({})", field, method, arg),
            Predicate::Member(field) => f.write_str(field),
            Predicate::Constant(v) => write!(f, "{}", v),
        }
    }
}

/// Types that support the string-method family.
pub trait Textual: FieldValue {}

impl Textual for String {}
impl Textual for Option<String> {}

/// Typed handle to a field `name` of model `M` holding values of type `T`.
pub struct Field<M, T> {
    name: &'static str,
    _marker: PhantomData<fn() -> (M, T)>,
}

impl<M, T> Clone for Field<M, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, T> Copy for Field<M, T> {}

impl<M, T> fmt::Debug for Field<M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

#[allow(clippy::should_implement_trait)]
impl<M: Model, T: FieldValue + 'static> Field<M, T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn compare(self, op: CompareOp, operand: Operand) -> Filter<M> {
        Filter::new(Predicate::compare(self.name, op, operand))
    }

    fn deferred<F>(f: F) -> Operand
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Operand::eval(move || f().into_value())
    }

    pub fn eq(self, value: impl Into<T>) -> Filter<M> {
        self.compare(CompareOp::Eq, Operand::Value(value.into().into_value()))
    }

    pub fn ne(self, value: impl Into<T>) -> Filter<M> {
        self.compare(CompareOp::Ne, Operand::Value(value.into().into_value()))
    }

    pub fn eq_with<F>(self, f: F) -> Filter<M>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.compare(CompareOp::Eq, Self::deferred(f))
    }

    pub fn ne_with<F>(self, f: F) -> Filter<M>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.compare(CompareOp::Ne, Self::deferred(f))
    }

    pub fn ascending(self) -> SortField {
        SortField::new(self.name, SortDirection::Ascending)
    }

    pub fn descending(self) -> SortField {
        SortField::new(self.name, SortDirection::Descending)
    }
}

impl<M: Model, T: Ordered + 'static> Field<M, T> {
    pub fn gt(self, value: impl Into<T>) -> Filter<M> {
        self.compare(CompareOp::Gt, Operand::Value(value.into().into_value()))
    }

    pub fn ge(self, value: impl Into<T>) -> Filter<M> {
        self.compare(CompareOp::Ge, Operand::Value(value.into().into_value()))
    }

    pub fn lt(self, value: impl Into<T>) -> Filter<M> {
        self.compare(CompareOp::Lt, Operand::Value(value.into().into_value()))
    }

    pub fn le(self, value: impl Into<T>) -> Filter<M> {
        self.compare(CompareOp::Le, Operand::Value(value.into().into_value()))
    }

    /// `field > f()`, with `f` evaluated when the filter is compiled.
    pub fn gt_with<F>(self, f: F) -> Filter<M>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.compare(CompareOp::Gt, Self::deferred(f))
    }

    pub fn ge_with<F>(self, f: F) -> Filter<M>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.compare(CompareOp::Ge, Self::deferred(f))
    }

    pub fn lt_with<F>(self, f: F) -> Filter<M>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.compare(CompareOp::Lt, Self::deferred(f))
    }

    pub fn le_with<F>(self, f: F) -> Filter<M>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.compare(CompareOp::Le, Self::deferred(f))
    }
}

impl<M: Model, T: Textual + 'static> Field<M, T> {
    pub fn contains(self, text: impl Into<String>) -> Filter<M> {
        self.call(StringMethod::Contains, text.into())
    }

    pub fn starts_with(self, text: impl Into<String>) -> Filter<M> {
        self.call(StringMethod::StartsWith, text.into())
    }

    pub fn ends_with(self, text: impl Into<String>) -> Filter<M> {
        self.call(StringMethod::EndsWith, text.into())
    }

    fn call(self, method: StringMethod, text: String) -> Filter<M> {
        Filter::new(Predicate::call(self.name, method, Value::Text(text)))
    }
}

impl<M: Model> Field<M, bool> {
    /// Bare member access: the field is true.
    pub fn is_true(self) -> Filter<M> {
        Filter::new(Predicate::member(self.name))
    }

    /// Negated member access: `!field`.
    pub fn is_false(self) -> Filter<M> {
        !self.is_true()
    }
}

/// A predicate known to target model `M`.
pub struct Filter<M> {
    predicate: Predicate,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Clone for Filter<M> {
    fn clone(&self) -> Self {
        Self::new(self.predicate.clone())
    }
}

impl<M> fmt::Debug for Filter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Filter").field(&self.predicate).finish()
    }
}

impl<M> fmt::Display for Filter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.predicate, f)
    }
}

impl<M> Filter<M> {
    /// Wrap an untyped predicate. Field names are checked at compile time.
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            _marker: PhantomData,
        }
    }

    pub fn and(self, other: Filter<M>) -> Self {
        Self::new(self.predicate.and(other.predicate))
    }

    pub fn or(self, other: Filter<M>) -> Self {
        Self::new(self.predicate.or(other.predicate))
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn into_predicate(self) -> Predicate {
        self.predicate
    }
}

impl<M> BitAnd for Filter<M> {
    type Output = Filter<M>;

    fn bitand(self, rhs: Filter<M>) -> Filter<M> {
        self.and(rhs)
    }
}

impl<M> BitOr for Filter<M> {
    type Output = Filter<M>;

    fn bitor(self, rhs: Filter<M>) -> Filter<M> {
        self.or(rhs)
    }
}

impl<M> Not for Filter<M> {
    type Output = Filter<M>;

    fn not(self) -> Filter<M> {
        Self::new(self.predicate.negate())
    }
}

/// Sort direction for `SORTBY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Sort directive: field plus direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelSchema;

    struct Hero;

    impl Model for Hero {
        const INDEX_NAME: &'static str = "heroes";
        fn schema() -> ModelSchema {
            ModelSchema::new::<Self>()
        }
    }

    const NAME: Field<Hero, String> = Field::new("Name");
    const LEVEL: Field<Hero, i32> = Field::new("Level");
    const LEGENDARY: Field<Hero, bool> = Field::new("IsLegendary");

    #[test]
    fn test_compare_node() {
        let filter = LEVEL.ge(10);
        match filter.predicate() {
            Predicate::Compare { field, op, value } => {
                assert_eq!(field, "Level");
                assert_eq!(*op, CompareOp::Ge);
                assert!(matches!(value, Operand::Value(Value::Int(10))));
            }
            other => panic!("Expected Compare node, got {:?}", other),
        }
    }

    #[test]
    fn test_and_or_not_operators() {
        let filter = (LEVEL.eq(1) | LEVEL.eq(2)) & !LEGENDARY.is_true();
        match filter.into_predicate() {
            Predicate::And(left, right) => {
                assert!(matches!(*left, Predicate::Or(_, _)));
                assert!(matches!(*right, Predicate::Not(_)));
            }
            other => panic!("Expected And node, got {:?}", other),
        }
    }

    #[test]
    fn test_string_methods() {
        let filter = NAME.contains("ali");
        match filter.predicate() {
            Predicate::Call { field, method, .. } => {
                assert_eq!(field, "Name");
                assert_eq!(*method, StringMethod::Contains);
            }
            other => panic!("Expected Call node, got {:?}", other),
        }
    }

    #[test]
    fn test_deferred_operand_is_not_evaluated_by_builder() {
        let filter = LEVEL.gt_with(|| 41 + 1);
        match filter.predicate() {
            Predicate::Compare { value: Operand::Eval(f), .. } => assert_eq!(f(), Value::Int(42)),
            other => panic!("Expected deferred operand, got {:?}", other),
        }
    }

    #[test]
    fn test_display_names_the_fragment() {
        let filter = LEGENDARY.is_false() | NAME.eq("Bob");
        assert_eq!(filter.to_string(), r#"(!IsLegendary || Name == "Bob")"#);
    }

    #[test]
    fn test_sort_handles() {
        assert_eq!(LEVEL.descending(), SortField::new("Level", SortDirection::Descending));
        assert_eq!(SortDirection::Ascending.keyword(), "ASC");
    }
}
