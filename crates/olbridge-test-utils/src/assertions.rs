//! Assertion helpers over recorded catalog calls.

use serde_json::Value;

use crate::catalog::RecordingCatalog;

/// Asserts that exactly `expected` upserts were issued.
///
/// # Panics
///
/// Panics if the count differs.
pub fn assert_upsert_count(catalog: &RecordingCatalog, expected: usize) {
    let upserts = catalog.upserts();
    assert_eq!(
        upserts.len(),
        expected,
        "Expected {expected} upserts, got {}: {upserts:?}",
        upserts.len()
    );
}

/// Asserts that a delete was issued for `qualified_name` and `type_name`.
///
/// # Panics
///
/// Panics if no such delete was recorded.
pub fn assert_deleted(catalog: &RecordingCatalog, qualified_name: &str, type_name: &str) {
    let deletes = catalog.deletes();
    assert!(
        deletes
            .iter()
            .any(|(qn, t)| qn == qualified_name && t == type_name),
        "Expected delete of {qualified_name} ({type_name}), got {deletes:?}"
    );
}

/// Returns the document in `batch` with the given qualified name.
///
/// # Panics
///
/// Panics if no document matches.
pub fn find_entity<'a>(entities: &'a [Value], qualified_name: &str) -> &'a Value {
    entities
        .iter()
        .find(|e| e.pointer("/attributes/qualifiedName").and_then(Value::as_str) == Some(qualified_name))
        .unwrap_or_else(|| panic!("no entity with qualifiedName {qualified_name} in {entities:?}"))
}
