//! Property-based test generators using proptest.
//!
//! Names produced here are always valid key segments, and documents never
//! carry `@entity` markers unless a generator says so.

use elysian_core::{Document, FilterNode};
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for valid entity type names.
pub fn entity_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("invalid regex")
}

/// Strategy for valid top-level field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9_]{0,11}")
        .expect("invalid regex")
        .prop_filter("reserved field", |s| s != "id")
}

/// Strategy for document ids.
pub fn id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9-]{1,24}").expect("invalid regex")
}

/// Strategy for JSON scalars.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for JSON values nested up to three levels, without links.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Strategy for documents with 0..8 fields and no `id`.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..8)
        .prop_map(|map| map.into_iter().collect())
}

/// Strategy for documents carrying an explicit `id`.
pub fn document_with_id_strategy() -> impl Strategy<Value = Document> {
    (id_strategy(), document_strategy()).prop_map(|(id, mut doc)| {
        doc.insert("id".to_string(), Value::String(id));
        doc
    })
}

/// Strategy for filter operator names, string-valued ones included.
pub fn operator_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "eq", "neq", "lt", "lte", "gt", "gte", "contains", "not_contains", "any", "all", "none",
    ])
}

/// Strategy for single-condition filter leaves.
pub fn leaf_strategy() -> impl Strategy<Value = FilterNode> {
    (field_name_strategy(), operator_strategy(), "[a-zA-Z0-9*,]{0,8}")
        .prop_map(|(field, op, arg)| FilterNode::leaf(field, op, arg))
}

/// Strategy for filter trees up to three levels deep.
pub fn filter_strategy() -> impl Strategy<Value = FilterNode> {
    leaf_strategy().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(FilterNode::And),
            prop::collection::vec(inner, 0..3).prop_map(FilterNode::Or),
        ]
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
