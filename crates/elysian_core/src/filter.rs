//! Filter trees and their evaluation against documents.
//!
//! A [`FilterNode`] is a leaf (`field -> op -> argument`), an `and` of
//! children or an `or` of children. A leaf matches when, for every field,
//! at least one value reachable through the field path satisfies every
//! operator given for it.
//!
//! Arguments are always strings and are coerced to the type of the value
//! they are compared with:
//!
//! | value   | operators |
//! |---------|-----------|
//! | string  | `eq`/`neq` (glob, or chronological for dates), `lt`, `lte`, `gt`, `gte`, `contains`, `not_contains`, `any`, `all`, `none` |
//! | number  | `eq`, `neq`, `lt`, `lte`, `gt`, `gte` |
//! | boolean | `eq`, `neq` (`true`/`false`/`1`/`0`) |
//! | array   | `eq`/`neq` (multiset), `contains`, `not_contains`, `any`, `all`, `none` |
//!
//! Anything else (maps, null, unknown operators) does not match.

use crate::compare::TimeSpan;
use crate::error::{CoreError, CoreResult};
use crate::field::resolve_values;
use crate::query::SortSpec;
use elysian_store::{Document, GlobPattern};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Operators for one field: `op -> argument`.
pub type FieldOps = BTreeMap<String, String>;

/// A leaf filter: `field path -> operators`.
pub type LeafFilter = BTreeMap<String, FieldOps>;

/// A filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equality (glob on strings).
    Eq,
    /// Negated equality.
    Neq,
    /// Strictly less.
    Lt,
    /// Less or equal.
    Lte,
    /// Strictly greater.
    Gt,
    /// Greater or equal.
    Gte,
    /// Substring or element membership.
    Contains,
    /// Negated `contains`.
    NotContains,
    /// At least one listed value present.
    Any,
    /// Every listed value present.
    All,
    /// No listed value present.
    None,
}

impl Operator {
    /// Looks an operator up by its query-string name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "any" => Self::Any,
            "all" => Self::All,
            "none" => Self::None,
            _ => return None,
        })
    }
}

/// A filter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterNode {
    /// Field conditions, all of which must hold.
    Leaf(LeafFilter),
    /// Every child must match.
    And(Vec<FilterNode>),
    /// At least one child must match.
    Or(Vec<FilterNode>),
}

impl FilterNode {
    /// A leaf with a single condition.
    pub fn leaf(field: impl Into<String>, op: impl Into<String>, arg: impl Into<String>) -> Self {
        let mut ops = FieldOps::new();
        ops.insert(op.into(), arg.into());
        let mut leaf = LeafFilter::new();
        leaf.insert(field.into(), ops);
        Self::Leaf(leaf)
    }

    /// True for a leaf without conditions or a group without children.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Leaf(leaf) => leaf.is_empty(),
            Self::And(children) | Self::Or(children) => children.is_empty(),
        }
    }

    /// Evaluates the tree against `doc`.
    ///
    /// An empty root matches nothing. Below the root, an empty `and` holds
    /// and an empty `or` or leaf does not.
    pub fn matches(&self, doc: &Document) -> bool {
        !self.is_empty() && self.evaluate(doc)
    }

    fn evaluate(&self, doc: &Document) -> bool {
        match self {
            Self::Leaf(leaf) => !leaf.is_empty() && leaf_matches(doc, leaf),
            Self::And(children) => children.iter().all(|c| c.evaluate(doc)),
            Self::Or(children) => children.iter().any(|c| c.evaluate(doc)),
        }
    }

    /// Every field path mentioned in the tree.
    pub fn field_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Leaf(leaf) => out.extend(leaf.keys().map(String::as_str)),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_paths(out);
                }
            }
        }
    }

    /// Builds a tree from its JSON shape: `{"and": [...]}`, `{"or": [...]}`
    /// or `{"<field>": {"<op>": "<arg>"}}`.
    ///
    /// Field keys win over `and`/`or` in the same object. A scalar in place
    /// of the operator map is shorthand for `eq`. Numbers and booleans are
    /// accepted as arguments and arrays are joined with commas.
    pub fn from_json(value: &Value) -> CoreResult<Self> {
        let Value::Object(map) = value else {
            return Err(CoreError::invalid_query("filter node must be an object"));
        };

        let mut leaf = LeafFilter::new();
        let mut and = None;
        let mut or = None;
        for (key, value) in map {
            match (key.as_str(), value) {
                ("and", Value::Array(items)) => and = Some(Self::from_json_list(items)?),
                ("or", Value::Array(items)) => or = Some(Self::from_json_list(items)?),
                (field, Value::Object(ops)) => {
                    let mut parsed = FieldOps::new();
                    for (op, arg) in ops {
                        parsed.insert(op.clone(), argument_string(field, arg)?);
                    }
                    leaf.insert(field.to_string(), parsed);
                }
                (field, scalar) => {
                    let mut parsed = FieldOps::new();
                    parsed.insert("eq".to_string(), argument_string(field, scalar)?);
                    leaf.insert(field.to_string(), parsed);
                }
            }
        }

        Ok(match (leaf.is_empty(), and, or) {
            (false, _, _) => Self::Leaf(leaf),
            (true, Some(children), _) => Self::And(children),
            (true, None, Some(children)) => Self::Or(children),
            (true, None, None) => Self::Leaf(leaf),
        })
    }

    fn from_json_list(items: &[Value]) -> CoreResult<Vec<Self>> {
        items.iter().map(Self::from_json).collect()
    }

    /// Renders the tree in the shape [`FilterNode::from_json`] reads.
    pub fn to_json(&self) -> Value {
        let (key, children) = match self {
            Self::Leaf(leaf) => {
                let fields = leaf
                    .iter()
                    .map(|(field, ops)| {
                        let ops = ops
                            .iter()
                            .map(|(op, arg)| (op.clone(), Value::String(arg.clone())))
                            .collect();
                        (field.clone(), Value::Object(ops))
                    })
                    .collect();
                return Value::Object(fields);
            }
            Self::And(children) => ("and", children),
            Self::Or(children) => ("or", children),
        };
        let mut out = Document::new();
        out.insert(
            key.to_string(),
            Value::Array(children.iter().map(Self::to_json).collect()),
        );
        Value::Object(out)
    }
}

fn argument_string(field: &str, value: &Value) -> CoreResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(_) | Value::Object(_) | Value::Null => Err(nested_argument(field)),
                other => argument_string(field, other),
            })
            .collect::<CoreResult<Vec<_>>>()
            .map(|parts| parts.join(",")),
        Value::Object(_) | Value::Null => Err(nested_argument(field)),
    }
}

fn nested_argument(field: &str) -> CoreError {
    CoreError::invalid_query(format!("unsupported filter argument for field {field:?}"))
}

impl Serialize for FilterNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FilterNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(D::Error::custom)
    }
}

// === Evaluation ===

/// Returns true if every field of `leaf` matches `doc`. An empty leaf
/// matches.
pub fn leaf_matches(doc: &Document, leaf: &LeafFilter) -> bool {
    leaf.iter().all(|(path, ops)| {
        resolve_values(doc, path)
            .into_iter()
            .any(|value| match_value(value, ops))
    })
}

/// Returns true if `value` satisfies every operator in `ops`.
pub fn match_value(value: &Value, ops: &FieldOps) -> bool {
    ops.iter().all(|(name, arg)| {
        let Some(op) = Operator::from_name(name) else {
            return false;
        };
        match value {
            Value::String(s) => match_string(s, op, arg),
            Value::Number(n) => n.as_f64().is_some_and(|n| match_number(n, op, arg)),
            Value::Bool(b) => match_bool(*b, op, arg),
            Value::Array(items) => match_array(items, op, arg),
            Value::Object(_) | Value::Null => false,
        }
    })
}

fn split_list(arg: &str) -> impl Iterator<Item = &str> {
    arg.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bool(arg: &str) -> Option<bool> {
    match arg.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn glob_matches(pattern: &str, value: &str) -> bool {
    GlobPattern::new(pattern).is_ok_and(|glob| glob.is_match(value))
}

fn match_date(value: &str, op: Operator, arg: &str) -> Option<bool> {
    if !matches!(
        op,
        Operator::Eq | Operator::Neq | Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
    ) {
        return None;
    }
    let value = TimeSpan::parse(value)?;
    let arg = TimeSpan::parse(arg.trim())?;
    Some(match op {
        Operator::Eq => value.overlaps(&arg),
        Operator::Neq => !value.overlaps(&arg),
        Operator::Lt => value.before(&arg),
        Operator::Lte => !value.after(&arg),
        Operator::Gt => value.after(&arg),
        Operator::Gte => !value.before(&arg),
        _ => return None,
    })
}

fn match_string(value: &str, op: Operator, arg: &str) -> bool {
    if let Some(result) = match_date(value, op, arg) {
        return result;
    }
    match op {
        Operator::Eq => glob_matches(arg, value),
        Operator::Neq => !glob_matches(arg, value),
        Operator::Lt => value < arg,
        Operator::Lte => value <= arg,
        Operator::Gt => value > arg,
        Operator::Gte => value >= arg,
        Operator::Contains => value.contains(arg),
        Operator::NotContains => !value.contains(arg),
        Operator::Any => split_list(arg).any(|v| v == value),
        Operator::All => {
            let mut items = split_list(arg).peekable();
            items.peek().is_some() && items.all(|v| v == value)
        }
        Operator::None => !split_list(arg).any(|v| v == value),
    }
}

fn match_number(value: f64, op: Operator, arg: &str) -> bool {
    let Ok(arg) = arg.trim().parse::<f64>() else {
        return false;
    };
    match op {
        Operator::Eq => value == arg,
        Operator::Neq => value != arg,
        Operator::Lt => value < arg,
        Operator::Lte => value <= arg,
        Operator::Gt => value > arg,
        Operator::Gte => value >= arg,
        _ => false,
    }
}

fn match_bool(value: bool, op: Operator, arg: &str) -> bool {
    match (op, parse_bool(arg)) {
        (Operator::Eq, Some(arg)) => value == arg,
        (Operator::Neq, Some(arg)) => value != arg,
        _ => false,
    }
}

/// Equality of an array element with one textual argument, coercing the
/// argument to the element's type.
fn element_equals(element: &Value, arg: &str) -> bool {
    match element {
        Value::String(s) => s == arg,
        Value::Number(n) => match (n.as_f64(), arg.parse::<f64>()) {
            (Some(n), Ok(arg)) => n == arg,
            _ => false,
        },
        Value::Bool(b) => parse_bool(arg) == Some(*b),
        _ => false,
    }
}

fn multiset_equals(items: &[Value], args: &[&str]) -> bool {
    if items.len() != args.len() {
        return false;
    }
    let mut used = vec![false; items.len()];
    args.iter().all(|arg| {
        let slot = items
            .iter()
            .enumerate()
            .position(|(i, item)| !used[i] && element_equals(item, arg));
        match slot {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

fn match_array(items: &[Value], op: Operator, arg: &str) -> bool {
    let contains = |needle: &str| items.iter().any(|item| element_equals(item, needle));
    match op {
        Operator::Eq => multiset_equals(items, &split_list(arg).collect::<Vec<_>>()),
        Operator::Neq => !multiset_equals(items, &split_list(arg).collect::<Vec<_>>()),
        Operator::Contains => contains(arg.trim()),
        Operator::NotContains => !contains(arg.trim()),
        Operator::Any => split_list(arg).any(contains),
        Operator::All => {
            let wanted: Vec<&str> = split_list(arg).collect();
            !wanted.is_empty() && wanted.into_iter().all(contains)
        }
        Operator::None => !split_list(arg).any(contains),
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => false,
    }
}

// === Request parameters ===

/// Collects `filter[field][op]=value` (and `filter[field]=value`, meaning
/// `eq`) pairs into a leaf filter. Other parameters are ignored.
pub fn parse_filter_params<I, K, V>(params: I) -> LeafFilter
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut filters = LeafFilter::new();
    for (key, value) in params {
        let Some(inner) = key
            .as_ref()
            .strip_prefix("filter[")
            .and_then(|rest| rest.strip_suffix(']'))
        else {
            continue;
        };
        let (field, op) = inner.split_once("][").unwrap_or((inner, "eq"));
        filters
            .entry(field.to_string())
            .or_default()
            .insert(op.to_string(), value.as_ref().trim().to_string());
    }
    filters
}

/// Finds the first `sort[field]=asc|desc` parameter. Parameters with any
/// other direction are skipped.
pub fn parse_sort_params<I, K, V>(params: I) -> Option<SortSpec>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    params.into_iter().find_map(|(key, value)| {
        let field = key
            .as_ref()
            .strip_prefix("sort[")
            .and_then(|rest| rest.strip_suffix(']'))?;
        match value.as_ref().trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortSpec::new(field, true)),
            "desc" => Some(SortSpec::new(field, false)),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn check(entity: &Value, field: &str, op: &str, arg: &str) -> bool {
        let mut ops = FieldOps::new();
        ops.insert(op.to_string(), arg.to_string());
        let mut leaf = LeafFilter::new();
        leaf.insert(field.to_string(), ops);
        leaf_matches(&doc(entity.clone()), &leaf)
    }

    #[test]
    fn string_glob() {
        let e = json!({"name": "Alice"});
        assert!(check(&e, "name", "eq", "Ali*"));
        assert!(check(&e, "name", "eq", "A?ice"));
        assert!(!check(&e, "name", "neq", "Alice"));
        assert!(check(&e, "name", "contains", "lic"));
        assert!(!check(&e, "name", "contains", "LIC"));
        assert!(check(&e, "name", "not_contains", "bob"));
        assert!(check(&e, "name", "any", "Bob, Alice"));
        assert!(check(&e, "name", "none", "Bob,Carol"));
    }

    #[test]
    fn multiline_strings_glob() {
        let e = json!({"bio": "line one\nline two"});
        assert!(check(&e, "bio", "eq", "line*two"));
        assert!(!check(&e, "bio", "neq", "line*two"));
        assert!(check(&e, "bio", "eq", "line one?line two"));
    }

    #[test]
    fn string_ordering_is_lexicographic() {
        let e = json!({"code": "beta"});
        assert!(check(&e, "code", "gt", "alpha"));
        assert!(check(&e, "code", "lt", "gamma"));
        assert!(check(&e, "code", "lte", "beta"));
        assert!(!check(&e, "code", "gte", "delta"));
    }

    #[test]
    fn float_ops() {
        let e = json!({"age": 30.0});
        assert!(check(&e, "age", "eq", "30"));
        assert!(!check(&e, "age", "neq", "30"));
        assert!(check(&e, "age", "lt", "40"));
        assert!(check(&e, "age", "lte", "30"));
        assert!(check(&e, "age", "gt", "20"));
        assert!(check(&e, "age", "gte", "30"));
        assert!(!check(&e, "age", "eq", "thirty"));
        assert!(!check(&e, "age", "contains", "3"));
    }

    #[test]
    fn datetime_ops() {
        let e = json!({"createdAt": "2024-03-01T12:00:00Z"});
        assert!(check(&e, "createdAt", "eq", "2024-03-01T12:00:00Z"));
        assert!(!check(&e, "createdAt", "neq", "2024-03-01T12:00:00Z"));
        assert!(check(&e, "createdAt", "lt", "2024-03-01T13:00:00Z"));
        assert!(check(&e, "createdAt", "lte", "2024-03-01T12:00:00Z"));
        assert!(check(&e, "createdAt", "gt", "2024-03-01T11:00:00Z"));
        assert!(check(&e, "createdAt", "gte", "2024-03-01T12:00:00Z"));
        assert!(check(&e, "createdAt", "eq", "2024-03-01T14:00:00+02:00"));
    }

    #[test]
    fn date_only_against_datetime() {
        let e = json!({"createdAt": "2023-05-10T15:04:05Z"});
        assert!(check(&e, "createdAt", "eq", "2023-05-10"));
        assert!(!check(&e, "createdAt", "neq", "2023-05-10"));
        assert!(check(&e, "createdAt", "lt", "2023-05-11"));
        assert!(!check(&e, "createdAt", "lt", "2023-05-10"));
        assert!(check(&e, "createdAt", "gt", "2023-05-09"));
        assert!(!check(&e, "createdAt", "gt", "2023-05-10"));
        assert!(check(&e, "createdAt", "lte", "2023-05-10"));
        assert!(check(&e, "createdAt", "gte", "2023-05-10"));
    }

    #[test]
    fn date_only_ops() {
        let e = json!({"createdAt": "2023-05-10"});
        assert!(check(&e, "createdAt", "eq", "2023-05-10"));
        assert!(!check(&e, "createdAt", "neq", "2023-05-10"));
        assert!(check(&e, "createdAt", "lt", "2023-05-11"));
        assert!(check(&e, "createdAt", "lte", "2023-05-10"));
        assert!(check(&e, "createdAt", "gt", "2023-05-09"));
        assert!(check(&e, "createdAt", "gte", "2023-05-10"));
        assert!(check(&e, "createdAt", "eq", "2023-05-10T08:00:00Z"));
    }

    #[test]
    fn invalid_cases() {
        assert!(!check(&json!({"name": "Alice"}), "unknown", "eq", "test"));
        assert!(!check(&json!({"date": "invalid-date"}), "date", "eq", "2025-09-27T10:00:00Z"));
        assert!(!check(&json!({"meta": {"a": 1}}), "meta", "eq", "x"));
        assert!(!check(&json!({"v": null}), "v", "eq", "null"));
        assert!(!check(&json!({"name": "Alice"}), "name", "like", "Alice"));
    }

    #[test]
    fn booleans() {
        let e = json!({"active": true});
        assert!(check(&e, "active", "eq", "true"));
        assert!(check(&e, "active", "eq", "1"));
        assert!(!check(&e, "active", "eq", "0"));
        assert!(check(&e, "active", "neq", "false"));
        assert!(!check(&e, "active", "eq", "yes"));
        assert!(!check(&e, "active", "gt", "0"));
    }

    #[test]
    fn array_ops() {
        let e = json!({"tags": ["toto", "tata", "titi"]});
        assert!(check(&e, "tags", "contains", "toto"));
        assert!(!check(&e, "tags", "contains", "tutu"));
        assert!(check(&e, "tags", "not_contains", "tutu"));
        assert!(!check(&e, "tags", "not_contains", "toto"));
        assert!(check(&e, "tags", "all", "toto,tata"));
        assert!(!check(&e, "tags", "all", "toto,tutu"));
        assert!(check(&e, "tags", "any", "tutu,tata"));
        assert!(!check(&e, "tags", "any", "tutu,tete"));
        assert!(check(&e, "tags", "none", "tutu,tete"));
        assert!(!check(&e, "tags", "none", "tata,tete"));
        assert!(check(&e, "tags", "eq", "toto,tata,titi"));
        assert!(check(&e, "tags", "eq", "toto, titi ,tata"));
        assert!(!check(&e, "tags", "eq", "toto,tata"));
        assert!(check(&e, "tags", "neq", "toto,tata"));
        assert!(!check(&e, "tags", "lt", "z"));
    }

    #[test]
    fn array_multiset_counts_duplicates() {
        let e = json!({"tags": ["a", "a", "b"]});
        assert!(check(&e, "tags", "eq", "a,b,a"));
        assert!(!check(&e, "tags", "eq", "a,b,b"));
    }

    #[test]
    fn array_mixed_types() {
        let e = json!({"values": ["1", 2.0, "three", true]});
        assert!(check(&e, "values", "contains", "1"));
        assert!(check(&e, "values", "contains", "2"));
        assert!(check(&e, "values", "contains", "true"));
        assert!(check(&e, "values", "any", "two,three"));
        assert!(check(&e, "values", "none", "four,five"));
    }

    #[test]
    fn nested_paths_through_arrays() {
        let e = json!({"items": [{"price": 5}, {"price": 50}]});
        assert!(check(&e, "items.price", "gt", "10"));
        assert!(check(&e, "items.price", "lt", "10"));
        assert!(!check(&e, "items.price", "gt", "100"));
    }

    #[test]
    fn all_ops_must_hold_on_one_value() {
        let e = json!({"items": [{"price": 5}, {"price": 50}]});
        let mut ops = FieldOps::new();
        ops.insert("gt".into(), "10".into());
        ops.insert("lt".into(), "20".into());
        let mut leaf = LeafFilter::new();
        leaf.insert("items.price".into(), ops);
        assert!(!leaf_matches(&doc(e), &leaf));
    }

    #[test]
    fn tree_evaluation() {
        let d = doc(json!({"name": "Alice", "age": 30}));
        let alice = FilterNode::leaf("name", "eq", "Alice");
        let old = FilterNode::leaf("age", "gt", "50");

        assert!(FilterNode::And(vec![alice.clone()]).matches(&d));
        assert!(!FilterNode::And(vec![alice.clone(), old.clone()]).matches(&d));
        assert!(FilterNode::Or(vec![old.clone(), alice.clone()]).matches(&d));
        assert!(!FilterNode::Or(vec![old.clone()]).matches(&d));

        assert!(!FilterNode::And(vec![]).matches(&d));
        assert!(!FilterNode::Or(vec![]).matches(&d));
        assert!(!FilterNode::Leaf(LeafFilter::new()).matches(&d));
        assert!(FilterNode::And(vec![alice.clone(), FilterNode::And(vec![])]).matches(&d));
        assert!(!FilterNode::Or(vec![FilterNode::Leaf(LeafFilter::new())]).matches(&d));
    }

    #[test]
    fn json_shape() {
        let node: FilterNode = serde_json::from_value(json!({
            "and": [
                {"name": {"eq": "Ali*"}},
                {"or": [{"age": {"gt": 18}}, {"vip": true}]}
            ]
        }))
        .unwrap();

        let FilterNode::And(children) = &node else {
            panic!("expected and");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], FilterNode::leaf("name", "eq", "Ali*"));
        assert_eq!(
            children[1],
            FilterNode::Or(vec![
                FilterNode::leaf("age", "gt", "18"),
                FilterNode::leaf("vip", "eq", "true"),
            ])
        );

        let back: FilterNode = serde_json::from_value(serde_json::to_value(&node).unwrap()).unwrap();
        assert_eq!(back, node);
        assert_eq!(node.field_paths(), vec!["name", "age", "vip"]);
    }

    #[test]
    fn json_leaf_wins_and_array_arguments() {
        let node = FilterNode::from_json(&json!({
            "tags": {"all": ["go", "db"]},
            "or": [{"x": {"eq": "1"}}]
        }))
        .unwrap();
        assert_eq!(node, FilterNode::leaf("tags", "all", "go,db"));

        assert!(FilterNode::from_json(&json!([1, 2])).is_err());
        assert!(FilterNode::from_json(&json!({"a": {"eq": {"x": 1}}})).is_err());
        assert_eq!(
            FilterNode::from_json(&json!({})).unwrap(),
            FilterNode::Leaf(LeafFilter::new())
        );
    }

    #[test]
    fn filter_params() {
        let params = vec![
            ("filter[price][gt]", " 10 "),
            ("filter[name]", "Ali*"),
            ("filter[tags][any]", "a,b"),
            ("limit", "5"),
        ];
        let filters = parse_filter_params(params);
        assert_eq!(filters.len(), 3);
        assert_eq!(filters["price"]["gt"], "10");
        assert_eq!(filters["name"]["eq"], "Ali*");
        assert_eq!(filters["tags"]["any"], "a,b");
    }

    #[test]
    fn sort_params() {
        let sort = parse_sort_params(vec![("limit", "2"), ("sort[price]", "DESC")]).unwrap();
        assert_eq!(sort, SortSpec::new("price", false));

        let sort = parse_sort_params(vec![("sort[a]", "sideways"), ("sort[b]", "asc")]).unwrap();
        assert_eq!(sort, SortSpec::new("b", true));

        assert!(parse_sort_params(Vec::<(String, String)>::new()).is_none());
    }
}
