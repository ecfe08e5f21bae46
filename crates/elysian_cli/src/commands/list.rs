//! List command implementation.

use super::Target;
use elysian_core::field::parse_fields_param;
use elysian_core::filter::{parse_filter_params, parse_sort_params};
use elysian_core::ListQuery;

/// Builds a list request from `key=value` parameters, as a transport layer
/// would from a query string.
pub fn build_query(entity: &str, params: &[String]) -> Result<ListQuery, Box<dyn std::error::Error>> {
    let pairs: Vec<(&str, &str)> = params
        .iter()
        .map(|p| p.split_once('=').unwrap_or((p.as_str(), "")))
        .collect();

    let mut query = ListQuery::new(entity).filters(parse_filter_params(pairs.iter().copied()));
    query.sort = parse_sort_params(pairs.iter().copied());

    for (key, value) in pairs {
        match key {
            "limit" => query.limit = value.parse()?,
            "offset" => query.offset = value.parse()?,
            "search" => query.search = value.to_string(),
            "includes" => query.includes = value.to_string(),
            "fields" => query.fields = parse_fields_param(value),
            "countOnly" => query.count_only = value == "true",
            _ => {}
        }
    }
    Ok(query)
}

/// Runs the list command.
pub fn run(target: &Target, entity: &str, params: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let query = build_query(entity, params)?;
    let engine = target.open()?;
    let response = engine.list_response(&query)?;
    let body: serde_json::Value = serde_json::from_slice(&response.body)?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    engine.shutdown()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use elysian_core::SortSpec;

    fn params(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_query_parameters() {
        let query = build_query(
            "books",
            &params(&[
                "filter[price][gt]=10",
                "filter[title]=D*",
                "sort[price]=desc",
                "limit=5",
                "offset=2",
                "search=dune",
                "includes=author",
                "fields=title, price",
                "countOnly=true",
                "unknown=1",
            ]),
        )
        .unwrap();

        assert_eq!(query.filters["price"]["gt"], "10");
        assert_eq!(query.filters["title"]["eq"], "D*");
        assert_eq!(query.sort, Some(SortSpec::new("price", false)));
        assert_eq!((query.limit, query.offset), (5, 2));
        assert_eq!(query.search, "dune");
        assert_eq!(query.includes, "author");
        assert_eq!(query.fields, vec!["title", "price"]);
        assert!(query.count_only);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(build_query("books", &params(&["limit=many"])).is_err());
    }
}
