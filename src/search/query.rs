//! Queries before and after compilation.
//!
//! [`Query`] collects typed filters, a sort directive and content options for
//! one model. [`Query::compile`] turns it into a [`CompiledQuery`]: plain
//! condition clauses the executor joins into `FT.SEARCH` query text.

use std::fmt;
use std::marker::PhantomData;

use super::compiler::{CompileError, PredicateCompiler};
use super::predicate::{Filter, Predicate, SortField};
use crate::model::{analyze, Model, ModelDescriptor};

/// Engine-native form of a query, minus the result window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledQuery {
    /// Condition clauses, implicitly AND-ed.
    pub conditions: Vec<String>,
    pub sort: Option<SortField>,
    /// Request document fields instead of NOCONTENT.
    pub with_content: bool,
    /// RETURN fields; empty means all fields when content is requested.
    pub return_fields: Vec<String>,
}

impl CompiledQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pre-built condition clause.
    pub fn condition(mut self, clause: impl Into<String>) -> Self {
        self.conditions.push(clause.into());
        self
    }

    pub fn sort(mut self, sort: SortField) -> Self {
        self.sort = Some(sort);
        self
    }

    /// `*` with no conditions, the clause itself with one, `(a b ...)` otherwise.
    pub fn query_text(&self) -> String {
        match self.conditions.as_slice() {
            [] => "*".to_string(),
            [single] => single.clone(),
            many => format!("({})", many.join(" ")),
        }
    }
}

/// Uncompiled query over model `M`.
pub struct Query<M> {
    filters: Vec<Predicate>,
    sort: Option<SortField>,
    with_content: bool,
    return_fields: Vec<String>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Query<M> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            sort: self.sort.clone(),
            with_content: self.with_content,
            return_fields: self.return_fields.clone(),
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<String> = self.filters.iter().map(ToString::to_string).collect();
        f.debug_struct("Query")
            .field("filters", &filters)
            .field("sort", &self.sort)
            .field("with_content", &self.with_content)
            .field("return_fields", &self.return_fields)
            .finish()
    }
}

impl<M> Default for Query<M> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: None,
            with_content: false,
            return_fields: Vec::new(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> Query<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter; multiple filters are AND-ed.
    pub fn filter(mut self, filter: Filter<M>) -> Self {
        self.filters.push(filter.into_predicate());
        self
    }

    /// Sort by one field. A later call replaces an earlier one.
    pub fn sort_by(mut self, sort: SortField) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Return document fields along with ids.
    pub fn with_content(mut self) -> Self {
        self.with_content = true;
        self
    }

    /// Return only the named fields. Implies content.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.return_fields = fields.into_iter().map(Into::into).collect();
        self.with_content = true;
        self
    }

    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    /// Compile against the cached descriptor of `M`.
    pub fn compile(&self) -> Result<CompiledQuery, CompileError> {
        self.compile_with(&analyze::<M>())
    }

    /// Compile against an explicit descriptor.
    pub fn compile_with(&self, descriptor: &ModelDescriptor) -> Result<CompiledQuery, CompileError> {
        let compiler = PredicateCompiler::new(descriptor);

        let conditions = self
            .filters
            .iter()
            .map(|p| compiler.compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(sort) = &self.sort {
            compiler.check_sort_field(&sort.field)?;
        }
        for field in &self.return_fields {
            compiler.check_declared_field(field)?;
        }

        Ok(CompiledQuery {
            conditions,
            sort: self.sort.clone(),
            with_content: self.with_content,
            return_fields: self.return_fields.clone(),
        })
    }
}
