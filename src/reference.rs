use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::uuid_index::UuidIndex;

/// A field the registry serves either inlined or as a bare UUID string.
///
/// Depending on response depth and server-side caching, some endpoints
/// embed a related object in place while others emit only the UUID of an
/// object declared elsewhere in the same response. Deserialization keeps
/// whichever shape arrived; call sites pick a resolution policy:
/// [`Ref::resolve`] where the target is optional, [`Ref::resolve_required`]
/// where it is mandatory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Inline(T),
    ByUuid(String),
}

impl<T: DeserializeOwned> Ref<T> {
    /// Resolves an optional reference. An already-inline object is returned
    /// unchanged; a UUID that is missing from the index (or whose target
    /// does not have the expected shape) yields `None`.
    pub fn resolve(self, index: &UuidIndex<'_>) -> Option<T> {
        match self {
            Ref::Inline(value) => Some(value),
            Ref::ByUuid(uuid) => index
                .get(&uuid)
                .and_then(|raw| serde_json::from_value(raw.clone()).ok()),
        }
    }

    /// Resolves a mandatory reference. A UUID without a usable target in
    /// the index fails with [`Error::UnresolvedReference`].
    pub fn resolve_required(self, index: &UuidIndex<'_>, context: &'static str) -> Result<T> {
        match self {
            Ref::Inline(value) => Ok(value),
            Ref::ByUuid(uuid) => index
                .get(&uuid)
                .and_then(|raw| serde_json::from_value(raw.clone()).ok())
                .ok_or(Error::UnresolvedReference { uuid, context }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Unit {
        code: String,
    }

    const UNIT_UUID: &str = "3f2a9c1e-8b4d-4e6f-9a1b-2c3d4e5f6a7b";

    fn tree() -> Value {
        json!({ "unit": { "@uuid": UNIT_UUID, "code": "°C" } })
    }

    #[test]
    fn inline_objects_pass_through_unchanged() {
        let tree = tree();
        let index = UuidIndex::build(&tree);

        let reference: Ref<Unit> = serde_json::from_value(json!({ "code": "dbar" })).unwrap();
        assert_eq!(
            reference.resolve(&index),
            Some(Unit { code: "dbar".to_string() })
        );
    }

    #[test]
    fn uuid_strings_resolve_through_the_index() {
        let tree = tree();
        let index = UuidIndex::build(&tree);

        let reference: Ref<Unit> = serde_json::from_value(json!(UNIT_UUID)).unwrap();
        assert!(matches!(reference, Ref::ByUuid(_)));
        assert_eq!(
            reference.resolve(&index),
            Some(Unit { code: "°C".to_string() })
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let tree = tree();
        let index = UuidIndex::build(&tree);

        let reference: Ref<Unit> = serde_json::from_value(json!(UNIT_UUID)).unwrap();
        let first = reference.clone().resolve(&index);
        let second = reference.resolve(&index);
        assert_eq!(first, second);
    }

    #[test]
    fn optional_miss_degrades_to_none() {
        let tree = json!({});
        let index = UuidIndex::build(&tree);

        let reference: Ref<Unit> = Ref::ByUuid(UNIT_UUID.to_string());
        assert_eq!(reference.resolve(&index), None);
    }

    #[test]
    fn required_miss_is_an_error() {
        let tree = json!({});
        let index = UuidIndex::build(&tree);

        let reference: Ref<Unit> = Ref::ByUuid(UNIT_UUID.to_string());
        let err = reference.resolve_required(&index, "unit of measurement");
        assert!(matches!(
            err,
            Err(Error::UnresolvedReference { uuid, context })
                if uuid == UNIT_UUID && context == "unit of measurement"
        ));
    }
}
