//! Key namespace for entity documents and their indexes.
//!
//! Keys are built by plain substitution, with no escaping, so entity and
//! field names must never contain `:`, `*`, `?` or whitespace. Writes reject
//! such names with [`CoreError::InvalidName`]; reads treat them as absent.

use crate::error::{CoreError, CoreResult};

/// Names starting with this prefix belong to the engine itself and are
/// hidden from [`public`](crate::Engine::list_public_entity_types) listings.
pub const CORE_FIELDS_PREFIX: &str = "_elysiandb_core_";

/// Byte-store key of the newline-separated entity type registry.
pub const ENTITY_TYPES_KEY: &str = "api:internal:entity:types";

/// Prefix shared by every document and index key.
pub const ENTITY_NAMESPACE: &str = "api:entity:";

/// `api:entity:<E>:id:<ID>`
pub fn document_key(entity: &str, id: &str) -> String {
    format!("api:entity:{entity}:id:{id}")
}

/// `api:entity:<E>:*`
pub fn documents_pattern(entity: &str) -> String {
    format!("api:entity:{entity}:*")
}

/// `api:entity:<E>:internal:index:id`
pub fn id_index_key(entity: &str) -> String {
    format!("api:entity:{entity}:internal:index:id")
}

/// `api:entity:<E>:internal:index:fields:all`
pub fn indexed_fields_key(entity: &str) -> String {
    format!("api:entity:{entity}:internal:index:fields:all")
}

/// `api:entity:<E>:internal:index:field:<F>:sort:asc|desc`
pub fn sort_index_key(entity: &str, field: &str, ascending: bool) -> String {
    let direction = if ascending { "asc" } else { "desc" };
    format!("api:entity:{entity}:internal:index:field:{field}:sort:{direction}")
}

/// `api:entity:<E>:internal:index:field:<F>:*`
pub fn field_indexes_pattern(entity: &str, field: &str) -> String {
    format!("api:entity:{entity}:internal:index:field:{field}:*")
}

/// `api:entity:<E>:internal:index:*`
pub fn entity_indexes_pattern(entity: &str) -> String {
    format!("api:entity:{entity}:internal:index:*")
}

/// Returns true if `entity` is not reserved by the engine.
pub fn is_public_entity(entity: &str) -> bool {
    !entity.starts_with(CORE_FIELDS_PREFIX)
}

fn name_problem(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("must not be empty")
    } else if name.contains(':') {
        Some("must not contain ':'")
    } else if name.contains(['*', '?']) {
        Some("must not contain wildcards")
    } else if name.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else {
        None
    }
}

/// Returns true if `name` can be used as a key segment.
pub fn is_valid_name(name: &str) -> bool {
    name_problem(name).is_none()
}

/// Checks an entity type name.
pub fn validate_entity_name(entity: &str) -> CoreResult<()> {
    match name_problem(entity) {
        None => Ok(()),
        Some(reason) => Err(CoreError::InvalidName {
            kind: "entity",
            name: entity.to_string(),
            reason,
        }),
    }
}

/// Checks a (possibly dotted) field name.
pub fn validate_field_name(field: &str) -> CoreResult<()> {
    match name_problem(field) {
        None => Ok(()),
        Some(reason) => Err(CoreError::InvalidName {
            kind: "field",
            name: field.to_string(),
            reason,
        }),
    }
}
