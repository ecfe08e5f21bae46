//! Include resolution: expanding links into the documents they point to.
//!
//! A directive is `all` or a comma-separated list of dotted paths such as
//! `author,author.job,tags`. Each path segment names a field whose link (or
//! array of links) is replaced by the linked document with `@entity`
//! re-attached. Expansion stops at [`MAX_INCLUDE_DEPTH`] nested links, which
//! also breaks reference cycles.

use crate::filter::LeafFilter;
use crate::relationship::{link_target, ENTITY_FIELD};
use elysian_store::Document;
use serde_json::Value;
use std::collections::BTreeMap;

/// Maximum number of nested link expansions.
pub const MAX_INCLUDE_DEPTH: usize = 8;

/// Fields to expand below one level of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    /// Adds a dotted path.
    pub fn insert(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split('.').map(str::trim).filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
    }

    /// Returns true if nothing is to be expanded.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The subtree under `field`.
    pub fn get(&self, field: &str) -> Option<&IncludeTree> {
        self.children.get(field)
    }
}

/// A parsed include directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Includes {
    /// Expand every link found, up to the depth bound.
    All,
    /// Expand the listed paths only.
    Paths(IncludeTree),
}

impl Includes {
    /// Parses a directive. Returns `None` when it names nothing.
    pub fn parse(directive: &str) -> Option<Self> {
        let directive = directive.trim();
        if directive.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        let mut tree = IncludeTree::default();
        for path in directive.split(',') {
            tree.insert(path);
        }
        (!tree.is_empty()).then_some(Self::Paths(tree))
    }
}

/// Parent paths of the dotted filter fields: `author.job.title` yields
/// `author.job`.
pub fn extract_auto_includes(filters: &LeafFilter) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for field in filters.keys() {
        if let Some((parent, _)) = field.rsplit_once('.') {
            if !parent.is_empty() && !out.iter().any(|p| p == parent) {
                out.push(parent.to_string());
            }
        }
    }
    out
}

/// Combines a user directive with automatic include paths, dropping
/// duplicates and keeping first-seen order. `all` absorbs everything.
pub fn merge_includes(directive: &str, auto: &[String]) -> String {
    if directive.trim().eq_ignore_ascii_case("all") {
        return "all".to_string();
    }
    let mut merged: Vec<&str> = Vec::new();
    let user = directive.split(',').map(str::trim);
    for path in user.chain(auto.iter().map(|p| p.trim())) {
        if !path.is_empty() && !merged.contains(&path) {
            merged.push(path);
        }
    }
    merged.join(",")
}

/// Expands links in `doc` according to `includes`.
///
/// `resolve(entity, id)` reads a linked document. Links whose target is
/// missing are left as they are.
pub fn apply_includes<F>(doc: &mut Document, includes: &Includes, resolve: &F)
where
    F: Fn(&str, &str) -> Option<Document>,
{
    match includes {
        Includes::All => expand_all_in_map(doc, resolve, 0),
        Includes::Paths(tree) => expand_tree(doc, tree, resolve, 0),
    }
}

fn resolve_link<F>(map: &Document, resolve: &F) -> Option<Document>
where
    F: Fn(&str, &str) -> Option<Document>,
{
    let (entity, id) = link_target(map)?;
    let mut target = resolve(entity, id)?;
    target.insert(ENTITY_FIELD.to_string(), Value::String(entity.to_string()));
    Some(target)
}

fn expand_tree<F>(doc: &mut Document, tree: &IncludeTree, resolve: &F, depth: usize)
where
    F: Fn(&str, &str) -> Option<Document>,
{
    if depth >= MAX_INCLUDE_DEPTH {
        return;
    }
    for (field, subtree) in &tree.children {
        let Some(value) = doc.get_mut(field) else {
            continue;
        };
        match value {
            Value::Object(_) => expand_tree_value(value, subtree, resolve, depth),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    expand_tree_value(item, subtree, resolve, depth);
                }
            }
            _ => {}
        }
    }
}

fn expand_tree_value<F>(value: &mut Value, subtree: &IncludeTree, resolve: &F, depth: usize)
where
    F: Fn(&str, &str) -> Option<Document>,
{
    let Value::Object(map) = value else {
        return;
    };
    if link_target(map).is_some() {
        if let Some(mut target) = resolve_link(map, resolve) {
            expand_tree(&mut target, subtree, resolve, depth + 1);
            *map = target;
        }
    } else {
        expand_tree(map, subtree, resolve, depth);
    }
}

fn expand_all_in_map<F>(doc: &mut Document, resolve: &F, depth: usize)
where
    F: Fn(&str, &str) -> Option<Document>,
{
    for value in doc.values_mut() {
        expand_all_value(value, resolve, depth);
    }
}

fn expand_all_value<F>(value: &mut Value, resolve: &F, depth: usize)
where
    F: Fn(&str, &str) -> Option<Document>,
{
    match value {
        Value::Object(map) => {
            if link_target(map).is_some() {
                if depth >= MAX_INCLUDE_DEPTH {
                    return;
                }
                if let Some(mut target) = resolve_link(map, resolve) {
                    expand_all_in_map(&mut target, resolve, depth + 1);
                    *map = target;
                }
            } else {
                expand_all_in_map(map, resolve, depth);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                expand_all_value(item, resolve, depth);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::link;
    use serde_json::json;
    use std::collections::HashMap;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    struct Fixture(HashMap<(String, String), Document>);

    impl Fixture {
        fn new(entries: &[(&str, &str, Value)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(e, id, v)| ((e.to_string(), id.to_string()), doc(v.clone())))
                    .collect(),
            )
        }

        fn resolver(&self) -> impl Fn(&str, &str) -> Option<Document> + '_ {
            |entity: &str, id: &str| self.0.get(&(entity.to_string(), id.to_string())).cloned()
        }
    }

    #[test]
    fn parse_directives() {
        assert_eq!(Includes::parse("all"), Some(Includes::All));
        assert_eq!(Includes::parse(" ALL "), Some(Includes::All));
        assert_eq!(Includes::parse(""), None);
        assert_eq!(Includes::parse(" , "), None);

        let Some(Includes::Paths(tree)) = Includes::parse("author.job, tags") else {
            panic!("expected paths");
        };
        assert!(tree.get("author").unwrap().get("job").is_some());
        assert!(tree.get("tags").unwrap().is_empty());
    }

    #[test]
    fn auto_includes_and_merge() {
        let mut filters = LeafFilter::new();
        filters.insert("author.name".into(), Default::default());
        filters.insert("author.job.title".into(), Default::default());
        filters.insert("price".into(), Default::default());
        let auto = extract_auto_includes(&filters);
        assert_eq!(auto, vec!["author.job", "author"]);

        assert_eq!(merge_includes("tags, author", &auto), "tags,author,author.job");
        assert_eq!(merge_includes("", &auto), "author.job,author");
        assert_eq!(merge_includes("all", &auto), "all");
    }

    #[test]
    fn expands_listed_paths() {
        let fixture = Fixture::new(&[
            ("author", "A", json!({"id": "A", "name": "Ann", "job": link("job", "J")})),
            ("job", "J", json!({"id": "J", "@entity": "job", "title": "W"})),
            ("tag", "t1", json!({"id": "t1", "name": "go"})),
        ]);
        let resolve = fixture.resolver();

        let mut post = doc(json!({
            "author": link("author", "A"),
            "tags": [link("tag", "t1"), link("tag", "missing"), "x"]
        }));
        apply_includes(&mut post, &Includes::parse("author,tags").unwrap(), &resolve);

        assert_eq!(post["author"]["name"], "Ann");
        assert_eq!(post["author"]["@entity"], "author");
        assert_eq!(post["author"]["job"], link("job", "J"));
        assert_eq!(post["tags"][0]["name"], "go");
        assert_eq!(post["tags"][1], link("tag", "missing"));
        assert_eq!(post["tags"][2], "x");

        let mut post = doc(json!({"author": link("author", "A")}));
        apply_includes(&mut post, &Includes::parse("author.job").unwrap(), &resolve);
        assert_eq!(post["author"]["job"]["title"], "W");
    }

    #[test]
    fn all_expands_nested_links() {
        let fixture = Fixture::new(&[
            ("author", "A", json!({"id": "A", "job": link("job", "J")})),
            ("job", "J", json!({"id": "J", "title": "W"})),
        ]);
        let mut post = doc(json!({"meta": {"by": link("author", "A")}}));
        apply_includes(&mut post, &Includes::All, &fixture.resolver());
        assert_eq!(post["meta"]["by"]["job"]["title"], "W");
    }

    #[test]
    fn cycles_are_bounded() {
        let fixture = Fixture::new(&[
            ("a", "1", json!({"id": "1", "other": link("b", "2")})),
            ("b", "2", json!({"id": "2", "other": link("a", "1")})),
        ]);
        let mut root = doc(json!({"start": link("a", "1")}));
        apply_includes(&mut root, &Includes::All, &fixture.resolver());

        let mut depth = 0;
        let mut current = &root["start"];
        while current.get("other").is_some() {
            current = &current["other"];
            depth += 1;
        }
        assert_eq!(depth, MAX_INCLUDE_DEPTH);
        assert!(link_target(current.as_object().unwrap()).is_some());
    }
}
