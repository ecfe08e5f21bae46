//! Dotted field paths over documents.

use elysian_store::Document;
use serde_json::Value;

/// Follows `path` through nested maps. Arrays are not traversed.
pub fn get_nested_value<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Collects every value reachable through `path`.
///
/// Maps follow the next segment; arrays apply the remaining path to each
/// element and flatten the results. A missing key contributes nothing.
pub fn resolve_values<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((first, rest)) = parts.split_first() {
        if let Some(value) = doc.get(*first) {
            resolve_into(value, rest, &mut out);
        }
    }
    out
}

fn resolve_into<'a>(current: &'a Value, parts: &[&str], out: &mut Vec<&'a Value>) {
    let Some((first, rest)) = parts.split_first() else {
        out.push(current);
        return;
    };
    match current {
        Value::Object(map) => {
            if let Some(next) = map.get(*first) {
                resolve_into(next, rest, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve_into(item, parts, out);
            }
        }
        _ => {}
    }
}

/// Stores `value` at `path`, creating (or replacing non-map) intermediates.
pub fn set_nested_field(dest: &mut Document, path: &str, value: Value) {
    let mut parts = path.split('.').peekable();
    let mut current = dest;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part.to_string(), value);
            return;
        }
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Document::new()));
        if !slot.is_object() {
            *slot = Value::Object(Document::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
}

/// Projects `doc` onto `fields`. The `id` field is always kept.
pub fn filter_fields(doc: &Document, fields: &[String]) -> Document {
    let mut out = Document::new();
    if let Some(id) = doc.get("id") {
        out.insert("id".to_string(), id.clone());
    }
    for field in fields {
        if let Some(value) = get_nested_value(doc, field) {
            set_nested_field(&mut out, field, value.clone());
        }
    }
    out
}

/// Splits a `fields=a,b.c` parameter, dropping blanks.
pub fn parse_fields_param(param: &str) -> Vec<String> {
    param
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Returns true if any string in `doc`, at any depth, contains `term`
/// ignoring case. An empty term matches everything.
pub fn matches_search(doc: &Document, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    doc.values().any(|v| value_contains(v, &needle))
}

fn value_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| value_contains(v, needle)),
        Value::Object(map) => map.values().any(|v| value_contains(v, needle)),
        _ => false,
    }
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

    #[test]
    fn nested_value() {
        let d = doc(json!({"a": {"b": {"c": 1}}, "list": [{"x": 1}]}));
        assert_eq!(get_nested_value(&d, "a.b.c"), Some(&json!(1)));
        assert_eq!(get_nested_value(&d, "a.b"), Some(&json!({"c": 1})));
        assert_eq!(get_nested_value(&d, "a.x"), None);
        assert_eq!(get_nested_value(&d, "list.x"), None);
        assert_eq!(get_nested_value(&d, "missing"), None);
    }

    #[test]
    fn resolve_through_arrays() {
        let d = doc(json!({
            "items": [{"name": "a"}, {"name": "b"}, {"other": 1}],
            "tags": ["x", "y"],
            "deep": [{"inner": [{"v": 1}, {"v": 2}]}]
        }));
        assert_eq!(resolve_values(&d, "items.name"), vec![&json!("a"), &json!("b")]);
        assert_eq!(resolve_values(&d, "tags"), vec![&json!(["x", "y"])]);
        assert_eq!(resolve_values(&d, "deep.inner.v"), vec![&json!(1), &json!(2)]);
        assert!(resolve_values(&d, "items.missing").is_empty());
        assert!(resolve_values(&d, "nope").is_empty());
    }

    #[test]
    fn set_nested() {
        let mut d = Document::new();
        set_nested_field(&mut d, "a.b.c", json!(1));
        set_nested_field(&mut d, "a.d", json!(2));
        assert_eq!(Value::Object(d.clone()), json!({"a": {"b": {"c": 1}, "d": 2}}));

        set_nested_field(&mut d, "a.d.e", json!(3));
        assert_eq!(Value::Object(d), json!({"a": {"b": {"c": 1}, "d": {"e": 3}}}));
    }

    #[test]
    fn projection_keeps_id() {
        let d = doc(json!({"id": "1", "title": "T", "author": {"name": "N", "age": 3}, "x": 1}));
        let fields = parse_fields_param(" title , author.name,, missing ");
        assert_eq!(fields, vec!["title", "author.name", "missing"]);
        let projected = filter_fields(&d, &fields);
        assert_eq!(
            Value::Object(projected),
            json!({"id": "1", "title": "T", "author": {"name": "N"}})
        );
    }

    #[test]
    fn search_is_case_insensitive_and_deep() {
        let d = doc(json!({"title": "Hello World", "meta": {"tags": ["Rust", "db"]}, "n": 42}));
        assert!(matches_search(&d, "world"));
        assert!(matches_search(&d, "RUST"));
        assert!(matches_search(&d, ""));
        assert!(!matches_search(&d, "42"));
        assert!(!matches_search(&d, "python"));
    }
}
