//! Contact listings.
//!
//! `/items/{id}/contacts` serves person and role sub-objects in the shared
//! dual shape: declared once with an `@uuid`, referenced by bare UUID in
//! every later record of the same response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::item_tree::RawVocableTerm;
use crate::reference::Ref;
use crate::uuid_index::UuidIndex;

/// A person record from the registry's contact pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// A contact attached to an item, with its role resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Contact {
    /// `None` when the person reference could not be resolved.
    pub person: Option<Person>,
    /// Display label of the contact's role; empty when unresolved.
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawContactRecord {
    #[serde(default)]
    contact: Option<Ref<Person>>,
    #[serde(default)]
    role: Option<Ref<RawVocableTerm>>,
}

/// Parses contact records, resolving dual-shape person and role references.
/// Both references are optional; unresolvable ones degrade instead of
/// failing.
pub fn parse_contacts(records: &[Value]) -> Result<Vec<Contact>> {
    let mut index = UuidIndex::default();
    for record in records {
        index.extend(record);
    }

    let mut contacts = Vec::with_capacity(records.len());
    for record in records {
        let raw: RawContactRecord =
            serde_json::from_value(record.clone()).map_err(|source| Error::Json {
                context: "contact record".to_string(),
                source,
            })?;

        let person = raw.contact.and_then(|r| r.resolve(&index));
        let role = raw
            .role
            .and_then(|r| r.resolve(&index))
            .and_then(|term| term.display_name().map(str::to_string))
            .unwrap_or_default();
        contacts.push(Contact { person, role });
    }
    Ok(contacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PERSON_UUID: &str = "2b3c4d5e-6f70-4a1b-9c2d-3e4f5a6b7c8d";
    const ROLE_UUID: &str = "8d9e0f1a-2b3c-4d4e-8f5a-6b7c8d9e0f1a";

    #[test]
    fn shared_person_and_role_resolve_across_records() {
        let records = vec![
            json!({
                "contact": {
                    "@uuid": PERSON_UUID,
                    "id": 7,
                    "firstName": "Erika",
                    "lastName": "Musterfrau",
                    "email": "erika@awi.example"
                },
                "role": { "@uuid": ROLE_UUID, "generalName": "Principal Investigator" }
            }),
            json!({ "contact": PERSON_UUID, "role": ROLE_UUID }),
        ];

        let contacts = parse_contacts(&records).unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].role, "Principal Investigator");

        let person = contacts[1].person.as_ref().expect("resolved person");
        assert_eq!(person.last_name, "Musterfrau");
        assert_eq!(contacts[1].role, "Principal Investigator");
    }

    #[test]
    fn unresolvable_references_degrade() {
        let records = vec![json!({
            "contact": "9e8d7c6b-5a4f-4e3d-9c2b-1a0f9e8d7c6b",
            "role": "9e8d7c6b-5a4f-4e3d-9c2b-1a0f9e8d7c6b"
        })];

        let contacts = parse_contacts(&records).unwrap();
        assert_eq!(contacts[0].person, None);
        assert_eq!(contacts[0].role, "");
    }
}
