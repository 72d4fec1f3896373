//! Property-based tests for predicate compilation and index fingerprints.
//!
//! Uses proptest to check escaping, numeric range equivalence and fingerprint
//! sensitivity over generated inputs, and that parsing arbitrary replies never
//! panics.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;
use redis::Value;

use hashmodel::model::{analyze_schema, FieldKind, IndexKind, Indexed, Model, ModelSchema};
use hashmodel::search::{
    escape_value, parse_search_reply, unescape_value, Field, Filter, PredicateCompiler, SearchIndex,
    RESERVED_CHARS,
};

struct Sample;

impl Model for Sample {
    const INDEX_NAME: &'static str = "fuzz-samples";

    fn schema() -> ModelSchema {
        ModelSchema::new::<Self>()
            .indexed_with::<String>("Username", Indexed::kind(IndexKind::Tag))
            .indexed::<String>("Bio")
            .indexed::<i64>("Number")
    }
}

impl Sample {
    const USERNAME: Field<Sample, String> = Field::new("Username");
    const BIO: Field<Sample, String> = Field::new("Bio");
    const NUMBER: Field<Sample, i64> = Field::new("Number");
}

fn compile(filter: Filter<Sample>) -> String {
    let descriptor = analyze_schema(&Sample::schema());
    PredicateCompiler::new(&descriptor)
        .compile(filter.predicate())
        .expect("filter should compile")
}

/// Parse every `@Number:[lo hi]` clause and intersect them.
fn intersect_ranges(clause: &str) -> (f64, f64) {
    let mut lo = f64::NEG_INFINITY;
    let mut hi = f64::INFINITY;
    for part in clause.split("@Number:[").skip(1) {
        let body = &part[..part.find(']').expect("closing bracket")];
        let mut bounds = body.split(' ').map(|b| match b {
            "-inf" => f64::NEG_INFINITY,
            "+inf" => f64::INFINITY,
            n => n.parse::<f64>().expect("numeric bound"),
        });
        lo = lo.max(bounds.next().expect("lower bound"));
        hi = hi.min(bounds.next().expect("upper bound"));
    }
    (lo, hi)
}

// =============================================================================
// Strategies
// =============================================================================

fn reserved_heavy_string() -> impl Strategy<Value = String> {
    let reserved: Vec<char> = RESERVED_CHARS.iter().copied().chain([' ', '\t', '\n']).collect();
    prop::collection::vec(
        prop_oneof![
            prop::sample::select(reserved),
            any::<char>(),
        ],
        1..40,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn field_list() -> impl Strategy<Value = Vec<(String, FieldKind)>> {
    prop::collection::btree_map(
        "[A-Z][a-z]{1,8}",
        prop_oneof![Just(FieldKind::Numeric), Just(FieldKind::Text), Just(FieldKind::Tag)],
        1..8,
    )
    .prop_map(|m| m.into_iter().collect())
}

fn index_of(fields: &[(String, FieldKind)]) -> SearchIndex {
    fields
        .iter()
        .fold(SearchIndex::new("fuzz", "fuzz:"), |idx, (name, kind)| {
            idx.field(name.clone(), *kind, false)
        })
}

fn reply_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Nil),
        any::<i64>().prop_map(Value::Int),
        ".{0,12}".prop_map(|s: String| Value::BulkString(s.into_bytes())),
        ".{0,12}".prop_map(Value::SimpleString),
        Just(Value::Okay),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| prop::collection::vec(inner, 0..6).prop_map(Value::Array))
}

// =============================================================================
// Escaping
// =============================================================================

proptest! {
    #[test]
    fn prop_escape_roundtrip(s in reserved_heavy_string()) {
        prop_assert_eq!(unescape_value(&escape_value(&s)), s);
    }

    #[test]
    fn prop_tag_clause_unescapes_to_literal(s in reserved_heavy_string()) {
        let clause = compile(Sample::USERNAME.eq(s.clone()));
        let inner = clause
            .strip_prefix("@Username:{")
            .and_then(|c| c.strip_suffix('}'))
            .expect("tag clause shape");
        prop_assert_eq!(unescape_value(inner), s);
    }

    #[test]
    fn prop_escaped_literal_has_no_bare_reserved(s in reserved_heavy_string()) {
        let escaped = escape_value(&s);
        let mut chars = escaped.chars();
        while let Some(c) = chars.next() {
            prop_assert!(c == '\\' || !(c.is_whitespace() || RESERVED_CHARS.contains(&c)));
            if c == '\\' {
                prop_assert!(chars.next().is_some());
            }
        }
    }

    #[test]
    fn prop_text_methods_bounded_by_wildcards(s in "[a-z0-9]{1,12}") {
        prop_assert_eq!(compile(Sample::BIO.contains(s.clone())), format!("@Bio:*{}*", s));
        prop_assert_eq!(compile(Sample::BIO.starts_with(s.clone())), format!("@Bio:{}*", s));
        prop_assert_eq!(compile(Sample::BIO.ends_with(s.clone())), format!("@Bio:*{}", s));
    }
}

// =============================================================================
// Numeric ranges
// =============================================================================

proptest! {
    #[test]
    fn prop_numeric_eq_matches_closed_range(v in -1_000_000_000i64..1_000_000_000) {
        let eq = intersect_ranges(&compile(Sample::NUMBER.eq(v)));
        let between = intersect_ranges(&compile(Sample::NUMBER.ge(v) & Sample::NUMBER.le(v)));
        prop_assert_eq!(eq, between);
        prop_assert_eq!(eq, (v as f64, v as f64));
    }

    #[test]
    fn prop_strict_bounds_exclude_value(v in -1_000_000i64..1_000_000) {
        let (gt_lo, _) = intersect_ranges(&compile(Sample::NUMBER.gt(v)));
        let (_, lt_hi) = intersect_ranges(&compile(Sample::NUMBER.lt(v)));
        prop_assert!(gt_lo > v as f64);
        prop_assert!(gt_lo < (v + 1) as f64);
        prop_assert!(lt_hi < v as f64);
        prop_assert!(lt_hi > (v - 1) as f64);
    }
}

// =============================================================================
// Fingerprints
// =============================================================================

proptest! {
    #[test]
    fn prop_fingerprint_deterministic(fields in field_list()) {
        prop_assert_eq!(index_of(&fields).fingerprint(), index_of(&fields).fingerprint());
    }

    #[test]
    fn prop_fingerprint_changes_when_field_added(fields in field_list()) {
        let base = index_of(&fields);
        let added = base.clone().field("Zz_added", FieldKind::Tag, false);
        prop_assert_ne!(base.fingerprint(), added.fingerprint());
    }

    #[test]
    fn prop_fingerprint_changes_when_kind_changes(fields in field_list(), pick in any::<prop::sample::Index>()) {
        let mut changed = fields.clone();
        let i = pick.index(changed.len());
        changed[i].1 = match changed[i].1 {
            FieldKind::Numeric => FieldKind::Text,
            FieldKind::Text => FieldKind::Tag,
            FieldKind::Tag => FieldKind::Numeric,
        };
        prop_assert_ne!(index_of(&fields).fingerprint(), index_of(&changed).fingerprint());
    }
}

// =============================================================================
// Reply parsing
// =============================================================================

proptest! {
    #[test]
    fn fuzz_parse_search_reply_never_panics(reply in reply_value(), with_content in any::<bool>()) {
        let _ = parse_search_reply(reply, "fuzz:", 10, with_content);
    }
}
