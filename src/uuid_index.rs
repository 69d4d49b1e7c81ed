use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Reserved key under which registry responses self-declare shared objects.
pub const UUID_KEY: &str = "@uuid";

// Canonical 8-4-4-4-12 form with the version and variant nibbles constrained.
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[1-8][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("uuid pattern")
});

/// Returns whether `value` is a canonical UUID string.
pub fn is_uuid(value: &str) -> bool {
    UUID_RE.is_match(value)
}

/// Index of every sub-object in a response tree that declares an `@uuid`.
///
/// The registry emits a shared sub-object once, tagged with a UUID, and
/// references it elsewhere by that bare UUID string instead of re-embedding
/// it. The index makes those back-references resolvable. It borrows the
/// response tree and is scoped to a single parse: build, resolve, discard.
#[derive(Debug, Default)]
pub struct UuidIndex<'a> {
    entries: HashMap<&'a str, &'a Value>,
}

impl<'a> UuidIndex<'a> {
    /// Walks `tree` depth-first and records every object that declares a
    /// valid `@uuid`. Duplicate declarations overwrite; the last one wins
    /// (UUIDs are assumed unique per tree, duplicates are a data-quality
    /// condition upstream).
    pub fn build(tree: &'a Value) -> Self {
        let mut index = Self::default();
        index.extend(tree);
        index
    }

    /// Adds every `@uuid`-declaring object under `tree` to the index.
    pub fn extend(&mut self, tree: &'a Value) {
        match tree {
            Value::Object(map) => {
                if let Some(Value::String(uuid)) = map.get(UUID_KEY) {
                    if is_uuid(uuid) {
                        self.entries.insert(uuid.as_str(), tree);
                    }
                }
                for child in map.values() {
                    self.extend(child);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.extend(item);
                }
            }
            _ => {}
        }
    }

    /// Looks up the object that declared `uuid`, if any.
    pub fn get(&self, uuid: &str) -> Option<&'a Value> {
        self.entries.get(uuid).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
