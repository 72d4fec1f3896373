// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Infrastructure
//!
//! Index derivation and typed querying over RediSearch.
//!
//! # Architecture
//!
//! ```text
//! ModelDescriptor
//!     ├─→ SearchIndex::build → fingerprint → IndexSynchronizer → FT.CREATE
//!     └─→ PredicateCompiler
//!              ↑
//!     Filter<M> (typed builder) → Predicate (AST)
//!              ↓
//!         CompiledQuery → QueryExecutor → FT.SEARCH
//! ```
//!
//! # Query Language (RediSearch syntax)
//!
//! ```text
//! @Number:[5 5]              - Numeric equality (closed range)
//! @Number:[5.001 +inf]       - Numeric greater-than
//! @Bio:hello                 - Text term
//! @Username:{James}          - Tag equality
//! @Username:{1*}             - Tag prefix
//! (@a:{x} @b:[1 2])          - AND
//! (@a:{x} | @a:{y})          - OR
//! -(@IsLegendary:{True})     - NOT
//! ```

mod compiler;
mod executor;
mod index_manager;
mod predicate;
mod query;
mod synchronizer;

pub use compiler::{escape_value, unescape_value, CompileError, PredicateCompiler, NUMERIC_EPSILON, RESERVED_CHARS};
pub use executor::{build_search_args, parse_search_reply, total_pages, QueryExecutor, SearchPage};
pub use index_manager::{IndexManager, SearchField, SearchIndex};
pub use predicate::{
    CompareOp, Field, Filter, Operand, Predicate, SortDirection, SortField, StringMethod, Textual,
};
pub use query::{CompiledQuery, Query};
pub use synchronizer::{IndexMetadata, IndexState, IndexSynchronizer};
