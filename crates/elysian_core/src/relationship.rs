//! Embedded sub-entities and links.
//!
//! A map carrying a non-empty `"@entity"` string inside a document is an
//! embedded entity. On write it is moved into its own record and replaced
//! in place by a link `{"@entity": E, "id": ID}`. A map that already holds
//! nothing but `@entity`, `id` and `@id` is a link and is only normalized.

use elysian_store::Document;
use serde_json::Value;
use uuid::Uuid;

/// Field naming the entity type of an embedded map.
pub const ENTITY_FIELD: &str = "@entity";

/// Alternative id field accepted on embedded maps.
pub const ALT_ID_FIELD: &str = "@id";

/// A record extracted from an embedded map.
#[derive(Debug, Clone, PartialEq)]
pub struct SubEntity {
    /// Entity type, from `@entity`.
    pub entity: String,
    /// The record, with `id` and `@entity` set.
    pub document: Document,
}

/// Builds the link object `{"@entity": entity, "id": id}`.
pub fn link(entity: &str, id: &str) -> Value {
    let mut map = Document::new();
    map.insert(ENTITY_FIELD.to_string(), Value::String(entity.to_string()));
    map.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(map)
}

/// The `(entity, id)` a map points to, if it has a non-empty `@entity` and
/// a non-empty string `id`.
pub fn link_target(map: &Document) -> Option<(&str, &str)> {
    let entity = entity_tag(map)?;
    let id = map.get("id")?.as_str().filter(|id| !id.is_empty())?;
    Some((entity, id))
}

fn entity_tag(map: &Document) -> Option<&str> {
    map.get(ENTITY_FIELD)?.as_str().filter(|e| !e.is_empty())
}

fn non_empty_str<'a>(map: &'a Document, key: &str) -> Option<&'a str> {
    map.get(key)?.as_str().filter(|s| !s.is_empty())
}

/// Returns true if `map` has no fields beyond `@entity`, `id` and `@id`.
fn is_link_only(map: &Document) -> bool {
    map.keys()
        .all(|k| k == ENTITY_FIELD || k == "id" || k == ALT_ID_FIELD)
}

/// Replaces every embedded entity in `doc` with a link and returns the
/// extracted records, deepest first.
pub fn extract_sub_entities(doc: &mut Document) -> Vec<SubEntity> {
    let mut out = Vec::new();
    for value in doc.values_mut() {
        extract_value(value, &mut out);
    }
    out
}

fn extract_value(value: &mut Value, out: &mut Vec<SubEntity>) {
    match value {
        Value::Object(map) => {
            if let Some(replacement) = extract_map(map, out) {
                *value = replacement;
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut().filter(|item| item.is_object()) {
                extract_value(item, out);
            }
        }
        _ => {}
    }
}

/// Extracts `map` if it is tagged and returns the link replacing it.
/// Untagged maps are searched in place.
fn extract_map(map: &mut Document, out: &mut Vec<SubEntity>) -> Option<Value> {
    let Some(entity) = entity_tag(map).map(String::from) else {
        for value in map.values_mut() {
            extract_value(value, out);
        }
        return None;
    };

    let id = non_empty_str(map, "id")
        .or_else(|| non_empty_str(map, ALT_ID_FIELD))
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if !is_link_only(map) {
        let mut document = std::mem::take(map);
        document.remove(ALT_ID_FIELD);
        document.insert("id".to_string(), Value::String(id.clone()));
        document.insert(ENTITY_FIELD.to_string(), Value::String(entity.clone()));
        out.extend(extract_sub_entities(&mut document));
        out.push(SubEntity {
            entity: entity.clone(),
            document,
        });
    }
    Some(link(&entity, &id))
}
