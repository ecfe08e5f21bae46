//! List and query requests.

use crate::filter::{FilterNode, LeafFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort order on one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    /// Dotted field path.
    pub field: String,
    /// True for ascending order.
    pub ascending: bool,
}

impl SortSpec {
    /// Creates a sort on `field`.
    pub fn new(field: impl Into<String>, ascending: bool) -> Self {
        Self {
            field: field.into(),
            ascending,
        }
    }
}

/// A list request, as built by the transport layer from query parameters.
///
/// `limit = 0` means unlimited. `includes` is the raw directive (`all` or a
/// comma-separated list of dotted paths).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Entity type to list.
    pub entity: String,
    /// Maximum number of documents; 0 for no limit.
    pub limit: usize,
    /// Number of documents to skip.
    pub offset: usize,
    /// Optional sort.
    pub sort: Option<SortSpec>,
    /// Leaf filter; empty means no filtering.
    pub filters: LeafFilter,
    /// Case-insensitive search term; empty means no search.
    pub search: String,
    /// Include directive.
    pub includes: String,
    /// Field projection; empty keeps every field.
    pub fields: Vec<String>,
    /// Return `{"count": n}` instead of the documents.
    pub count_only: bool,
    /// Requesting user, part of the cache fingerprint.
    pub username: String,
}

impl ListQuery {
    /// Creates a request listing every document of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Sets the limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Sorts by `field`.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort = Some(SortSpec::new(field, ascending));
        self
    }

    /// Adds one filter condition.
    #[must_use]
    pub fn filter(
        mut self,
        field: impl Into<String>,
        op: impl Into<String>,
        arg: impl Into<String>,
    ) -> Self {
        self.filters
            .entry(field.into())
            .or_default()
            .insert(op.into(), arg.into());
        self
    }

    /// Replaces the whole leaf filter.
    #[must_use]
    pub fn filters(mut self, filters: LeafFilter) -> Self {
        self.filters = filters;
        self
    }

    /// Sets the search term.
    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }

    /// Sets the include directive.
    #[must_use]
    pub fn includes(mut self, directive: impl Into<String>) -> Self {
        self.includes = directive.into();
        self
    }

    /// Sets the field projection.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Requests a count instead of documents.
    #[must_use]
    pub fn count_only(mut self, count_only: bool) -> Self {
        self.count_only = count_only;
        self
    }

    /// Sets the requesting user.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }
}

/// A structured query, as posted in a request body.
///
/// ```json
/// {"entity": "books", "offset": 0, "limit": 10,
///  "filter": {"and": [{"price": {"gt": "10"}}]},
///  "sorts": {"price": "desc"}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    /// Entity type to query.
    pub entity: String,
    /// Number of documents to skip.
    pub offset: usize,
    /// Maximum number of documents; 0 for no limit.
    pub limit: usize,
    /// Optional filter tree.
    pub filter: Option<FilterNode>,
    /// `field -> "asc" | "desc"`. Only the first field (in key order) is used.
    pub sorts: BTreeMap<String, String>,
}

impl Query {
    /// The effective sort: the first entry of `sorts`, descending when its
    /// value is `desc` (any case).
    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sorts.iter().next().map(|(field, direction)| {
            SortSpec::new(field.clone(), !direction.eq_ignore_ascii_case("desc"))
        })
    }
}

/// Applies `offset` then `limit` (0 = unlimited).
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    let take = if limit == 0 { usize::MAX } else { limit };
    items.into_iter().skip(offset).take(take).collect()
}

/// The `offset..offset+limit` window of a slice, clamped to its bounds.
pub fn page_window<T>(items: &[T], offset: usize, limit: usize) -> &[T] {
    let start = offset.min(items.len());
    let end = if limit == 0 {
        items.len()
    } else {
        start.saturating_add(limit).min(items.len())
    };
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pagination() {
        let items: Vec<u32> = (0..5).collect();
        assert_eq!(paginate(items.clone(), 1, 2), vec![1, 2]);
        assert_eq!(paginate(items.clone(), 0, 0), items);
        assert_eq!(paginate(items.clone(), 10, 2), Vec::<u32>::new());
        assert_eq!(page_window(&items, 3, 10), &[3, 4]);
        assert_eq!(page_window(&items, 7, 0), &[] as &[u32]);
        assert_eq!(page_window(&items, 2, 0), &[2, 3, 4]);
    }

    #[test]
    fn builder_pattern() {
        let query = ListQuery::new("books")
            .limit(10)
            .offset(5)
            .sort("price", false)
            .filter("price", "gt", "3")
            .filter("price", "lt", "9")
            .search("dune")
            .includes("author")
            .fields(["title", "price"])
            .count_only(true)
            .username("alice");

        assert_eq!(query.entity, "books");
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 5);
        assert_eq!(query.sort, Some(SortSpec::new("price", false)));
        assert_eq!(query.filters["price"].len(), 2);
        assert_eq!(query.search, "dune");
        assert_eq!(query.includes, "author");
        assert_eq!(query.fields, vec!["title", "price"]);
        assert!(query.count_only);
        assert_eq!(query.username, "alice");
    }

    #[test]
    fn query_from_json() {
        let query: Query = serde_json::from_value(json!({
            "entity": "books",
            "limit": 2,
            "filter": {"price": {"gt": 3}},
            "sorts": {"title": "DESC", "price": "asc"}
        }))
        .unwrap();

        assert_eq!(query.entity, "books");
        assert_eq!(query.offset, 0);
        assert_eq!(query.limit, 2);
        assert_eq!(query.filter, Some(FilterNode::leaf("price", "gt", "3")));
        assert_eq!(query.sort_spec(), Some(SortSpec::new("price", true)));

        let query: Query = serde_json::from_value(json!({
            "entity": "books",
            "sorts": {"title": "Desc"}
        }))
        .unwrap();
        assert_eq!(query.sort_spec(), Some(SortSpec::new("title", false)));
        assert_eq!(Query::default().sort_spec(), None);
    }
}
