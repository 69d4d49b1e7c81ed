//! Parsing of detailed item trees.
//!
//! A detailed item response nests sensor outputs, their measurement
//! properties, and child items, with shared sub-objects (vocabulary terms,
//! units of measurement) declared once by `@uuid` and referenced elsewhere
//! by bare UUID string. [`parse_detailed_tree`] walks that tree and produces
//! the normalized [`Item`] hierarchy plus a flat urn -> [`Parameter`] map for
//! query-friendly lookups.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::reference::Ref;
use crate::util::normalize_key;
use crate::uuid_index::UuidIndex;

/// A node in the platform / instrument / parameter hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    /// Colon-delimited hierarchical code, e.g. `vessel:polarstern:pco2_go_ps`.
    pub code: String,
    pub short_name: String,
    pub long_name: String,
    pub description: String,
    /// Controlled-vocabulary classification; empty when the item is
    /// unclassified or the type reference could not be resolved.
    pub definition: String,
    pub children: Vec<Item>,
    /// Sensor outputs attached directly to this item.
    pub parameters: Vec<Parameter>,
}

/// A measurable output of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: i64,
    pub name: String,
    /// Short code; falls back to the name when no short code is defined.
    pub code: String,
    /// General measurement category.
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    /// Controlled-vocabulary term for the output.
    pub definition: String,
    /// Unit-of-measurement code.
    pub unit: String,
    /// Keyed by the property type's display name, lower-cased with
    /// whitespace replaced by underscores.
    pub properties: BTreeMap<String, Property>,
}

/// A bounded measurement characteristic of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A flat child-item listing record (no recursion), with its type resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubItem {
    pub id: i64,
    pub code: String,
    pub short_name: String,
    pub definition: String,
}

/// Result of parsing a detailed item tree.
///
/// `parameters` is a read-only snapshot keyed by `item.code:parameter.code`;
/// it owns its values and does not track later mutation of `items`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParsedTree {
    pub items: Vec<Item>,
    pub parameters: BTreeMap<String, Parameter>,
    /// Keys that were overwritten during map merges; last write wins.
    pub collisions: Vec<String>,
}

/// Controlled-vocabulary term, as served by the registry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawVocableTerm {
    #[serde(default)]
    pub(crate) general_name: Option<String>,
    #[serde(default)]
    pub(crate) vocable_value: Option<String>,
    // Either a bare vocabulary id or the vocabulary object itself.
    #[serde(default)]
    pub(crate) vocabulary: Option<Value>,
}

impl RawVocableTerm {
    pub(crate) fn display_name(&self) -> Option<&str> {
        self.general_name
            .as_deref()
            .or(self.vocable_value.as_deref())
            .filter(|name| !name.is_empty())
    }

    pub(crate) fn vocabulary_id(&self) -> String {
        match &self.vocabulary {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Object(map)) => map
                .get("id")
                .and_then(Value::as_i64)
                .map(|id| id.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawUnit {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
}

impl RawUnit {
    fn label(&self) -> String {
        self.code
            .clone()
            .filter(|code| !code.is_empty())
            .or_else(|| self.long_name.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawMeasurementProperty {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    lower_bound: Option<f64>,
    #[serde(default)]
    upper_bound: Option<f64>,
    #[serde(default)]
    measurement_property_type: Option<Ref<RawVocableTerm>>,
    #[serde(default)]
    unit_of_measurement: Option<Ref<RawUnit>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSensorOutput {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sensor_output_type: Option<Ref<RawVocableTerm>>,
    #[serde(default)]
    unit_of_measurement: Option<Ref<RawUnit>>,
    #[serde(default)]
    measurement_properties: Vec<Ref<RawMeasurementProperty>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawItem {
    #[serde(default)]
    id: Option<i64>,
    // Older API revisions serve the id under this name.
    #[serde(default, rename = "itemID")]
    item_id: Option<i64>,
    #[serde(default, alias = "urn")]
    code: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    item_type: Option<Ref<RawVocableTerm>>,
    #[serde(default)]
    sensor_outputs: Vec<Ref<RawSensorOutput>>,
    #[serde(default)]
    child_items: Vec<RawItem>,
}

impl RawItem {
    fn registry_id(&self) -> i64 {
        self.id.or(self.item_id).unwrap_or_default()
    }
}

/// Parses a sequence of raw detailed items into normalized [`Item`] trees
/// and one merged flat `item.code:parameter.code` -> [`Parameter`] map.
///
/// Items without sensor outputs and without children are valid leaves; they
/// contribute nothing to the flat map. Unclassified items get an empty
/// `definition`. Mandatory dereferences (sensor outputs, their types and
/// units, measurement properties) fail with
/// [`Error::UnresolvedReference`] when the UUID is dangling.
pub fn parse_detailed_tree(raw_items: &[Value], index: &UuidIndex<'_>) -> Result<ParsedTree> {
    let mut parameters = BTreeMap::new();
    let mut collisions = Vec::new();
    let mut items = Vec::with_capacity(raw_items.len());

    for raw in raw_items {
        let raw_item: RawItem = serde_json::from_value(raw.clone()).map_err(|source| Error::Json {
            context: "detailed item record".to_string(),
            source,
        })?;
        items.push(parse_item(raw_item, index, &mut parameters, &mut collisions)?);
    }

    Ok(ParsedTree {
        items,
        parameters,
        collisions,
    })
}

/// Parses flat child-item listing records (`/items?where=parent.id==..`),
/// resolving each record's dual-shape type field.
pub fn parse_subitems(records: &[Value]) -> Result<Vec<SubItem>> {
    let mut index = UuidIndex::default();
    for record in records {
        index.extend(record);
    }

    let mut subitems = Vec::with_capacity(records.len());
    for record in records {
        let raw: RawItem = serde_json::from_value(record.clone()).map_err(|source| Error::Json {
            context: "subitem record".to_string(),
            source,
        })?;
        subitems.push(SubItem {
            id: raw.registry_id(),
            code: raw.code.unwrap_or_default(),
            short_name: raw.short_name.unwrap_or_default(),
            definition: resolve_definition(raw.item_type, &index),
        });
    }
    Ok(subitems)
}

fn parse_item(
    raw: RawItem,
    index: &UuidIndex<'_>,
    flat: &mut BTreeMap<String, Parameter>,
    collisions: &mut Vec<String>,
) -> Result<Item> {
    let id = raw.registry_id();
    let code = raw.code.unwrap_or_default();
    let definition = resolve_definition(raw.item_type, index);

    let mut parameters = Vec::with_capacity(raw.sensor_outputs.len());
    for output in raw.sensor_outputs {
        let output = output.resolve_required(index, "sensor output")?;
        let parameter = parse_parameter(output, index, collisions)?;

        let key = format!("{}:{}", code, parameter.code);
        if flat.insert(key.clone(), parameter.clone()).is_some() {
            warn!("parameter map key collision: {key}");
            collisions.push(key);
        }
        parameters.push(parameter);
    }

    let mut children = Vec::with_capacity(raw.child_items.len());
    for child in raw.child_items {
        children.push(parse_item(child, index, flat, collisions)?);
    }

    Ok(Item {
        id,
        code,
        short_name: raw.short_name.unwrap_or_default(),
        long_name: raw.long_name.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
        definition,
        children,
        parameters,
    })
}

fn parse_parameter(
    output: RawSensorOutput,
    index: &UuidIndex<'_>,
    collisions: &mut Vec<String>,
) -> Result<Parameter> {
    let name = output.name.unwrap_or_default();
    let code = match output.short_name {
        Some(short) if !short.is_empty() => short,
        _ => name.clone(),
    };
    let definition = match output.sensor_output_type {
        Some(reference) => reference
            .resolve_required(index, "sensor output type")?
            .display_name()
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    };
    let unit = resolve_unit(output.unit_of_measurement, index, "sensor output unit")?;

    let mut properties = BTreeMap::new();
    for property in output.measurement_properties {
        let property = property.resolve_required(index, "measurement property")?;
        let (key, property) = parse_property(property, index)?;
        if properties.insert(key.clone(), property).is_some() {
            warn!("property map key collision: {key}");
            collisions.push(key);
        }
    }

    Ok(Parameter {
        id: output.id.unwrap_or_default(),
        name,
        code,
        kind: output.kind.unwrap_or_default(),
        description: output.description.unwrap_or_default(),
        definition,
        unit,
        properties,
    })
}

fn parse_property(
    raw: RawMeasurementProperty,
    index: &UuidIndex<'_>,
) -> Result<(String, Property)> {
    let kind = match raw.measurement_property_type {
        Some(reference) => reference
            .resolve_required(index, "measurement property type")?
            .display_name()
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    };
    let name = match raw.name {
        Some(name) if !name.is_empty() => name,
        _ => kind.clone(),
    };
    // Untyped properties key on their own name instead.
    let key = normalize_key(if kind.is_empty() { &name } else { &kind });
    let unit = resolve_unit(raw.unit_of_measurement, index, "measurement property unit")?;

    Ok((
        key,
        Property {
            name,
            lower: raw.lower_bound,
            upper: raw.upper_bound,
            unit,
            kind,
        },
    ))
}

fn resolve_definition(reference: Option<Ref<RawVocableTerm>>, index: &UuidIndex<'_>) -> String {
    reference
        .and_then(|r| r.resolve(index))
        .and_then(|term| term.display_name().map(str::to_string))
        .unwrap_or_default()
}

fn resolve_unit(
    reference: Option<Ref<RawUnit>>,
    index: &UuidIndex<'_>,
    context: &'static str,
) -> Result<String> {
    match reference {
        Some(reference) => Ok(reference.resolve_required(index, context)?.label()),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const UNIT_UUID: &str = "5d6e7f80-91a2-4b3c-8d4e-5f6a7b8c9d0e";
    const TYPE_UUID: &str = "1a2b3c4d-5e6f-4a7b-9c8d-0e1f2a3b4c5d";

    fn parse_one(raw: Value) -> ParsedTree {
        let index = UuidIndex::build(&raw);
        parse_detailed_tree(std::slice::from_ref(&raw), &index).unwrap()
    }

    #[test]
    fn leaf_item_parses_to_empty_collections() {
        let tree = parse_one(json!({
            "id": 17,
            "code": "vessel:polarstern",
            "shortName": "PS",
            "longName": "Polarstern",
            "description": "research vessel"
        }));

        let item = &tree.items[0];
        assert_eq!(item.id, 17);
        assert_eq!(item.code, "vessel:polarstern");
        assert_eq!(item.definition, "");
        assert!(item.children.is_empty());
        assert!(item.parameters.is_empty());
        assert!(tree.parameters.is_empty());
        assert!(tree.collisions.is_empty());
    }

    #[test]
    fn legacy_item_id_field_is_accepted() {
        let tree = parse_one(json!({ "itemID": 99, "code": "vessel:ps" }));
        assert_eq!(tree.items[0].id, 99);
    }

    #[test]
    fn flat_map_keys_join_item_and_parameter_codes() {
        let tree = parse_one(json!({
            "id": 1,
            "code": "vessel:polarstern:pco2",
            "sensorOutputs": [{
                "id": 10,
                "name": "xCO2 before drying",
                "shortName": "pre_xco2",
                "unitOfMeasurement": { "@uuid": UNIT_UUID, "code": "ppm" }
            }]
        }));

        assert_eq!(tree.parameters.len(), 1);
        let parameter = tree
            .parameters
            .get("vessel:polarstern:pco2:pre_xco2")
            .expect("fully qualified key");
        assert_eq!(parameter.unit, "ppm");
        assert_eq!(tree.items[0].parameters[0], *parameter);
    }

    #[test]
    fn parameter_code_falls_back_to_name() {
        let tree = parse_one(json!({
            "id": 1,
            "code": "vessel:ps:ctd",
            "sensorOutputs": [{ "id": 2, "name": "temperature" }]
        }));

        assert_eq!(tree.items[0].parameters[0].code, "temperature");
        assert!(tree.parameters.contains_key("vessel:ps:ctd:temperature"));
    }

    #[test]
    fn property_keys_are_normalized_type_names() {
        let tree = parse_one(json!({
            "id": 1,
            "code": "vessel:ps:ctd",
            "sensorOutputs": [{
                "id": 2,
                "shortName": "press",
                "name": "pressure",
                "measurementProperties": [{
                    "name": "valid range",
                    "lowerBound": 0.0,
                    "upperBound": 6000.0,
                    "measurementPropertyType": { "@uuid": TYPE_UUID, "generalName": "Sampling Depth" },
                    "unitOfMeasurement": { "@uuid": UNIT_UUID, "code": "dbar" }
                }]
            }]
        }));

        let parameter = &tree.items[0].parameters[0];
        let property = parameter.properties.get("sampling_depth").expect("normalized key");
        assert_eq!(property.kind, "Sampling Depth");
        assert_eq!(property.lower, Some(0.0));
        assert_eq!(property.upper, Some(6000.0));
        assert_eq!(property.unit, "dbar");
    }

    #[test]
    fn shared_unit_reference_resolves_for_every_user() {
        let raw = json!([
            {
                "id": 1,
                "code": "vessel:ps:a",
                "sensorOutputs": [{
                    "id": 10,
                    "shortName": "t1",
                    "unitOfMeasurement": { "@uuid": UNIT_UUID, "code": "°C" }
                }]
            },
            {
                "id": 2,
                "code": "vessel:ps:b",
                "sensorOutputs": [{
                    "id": 11,
                    "shortName": "t2",
                    "unitOfMeasurement": UNIT_UUID
                }]
            }
        ]);

        let index = UuidIndex::build(&raw);
        let records = raw.as_array().unwrap();
        let tree = parse_detailed_tree(records, &index).unwrap();

        assert_eq!(tree.parameters["vessel:ps:a:t1"].unit, "°C");
        assert_eq!(tree.parameters["vessel:ps:b:t2"].unit, "°C");
    }

    #[test]
    fn dangling_unit_reference_fails() {
        let raw = json!({
            "id": 1,
            "code": "vessel:ps:a",
            "sensorOutputs": [{
                "id": 10,
                "shortName": "t1",
                "unitOfMeasurement": "9e8d7c6b-5a4f-4e3d-9c2b-1a0f9e8d7c6b"
            }]
        });

        let index = UuidIndex::build(&raw);
        let err = parse_detailed_tree(std::slice::from_ref(&raw), &index);
        assert!(matches!(
            err,
            Err(Error::UnresolvedReference { context: "sensor output unit", .. })
        ));
    }

    #[test]
    fn dangling_item_type_degrades_to_empty_definition() {
        let tree = parse_one(json!({
            "id": 1,
            "code": "vessel:ps",
            "type": "9e8d7c6b-5a4f-4e3d-9c2b-1a0f9e8d7c6b"
        }));
        assert_eq!(tree.items[0].definition, "");
    }

    #[test]
    fn child_items_recurse_and_merge_into_the_flat_map() {
        let tree = parse_one(json!({
            "id": 1,
            "code": "vessel:polarstern",
            "type": { "@uuid": TYPE_UUID, "generalName": "Vessel" },
            "childItems": [{
                "id": 2,
                "code": "vessel:polarstern:pco2",
                "sensorOutputs": [{
                    "id": 20,
                    "shortName": "pre_xco2",
                    "unitOfMeasurement": { "@uuid": UNIT_UUID, "code": "ppm" }
                }]
            }]
        }));

        assert_eq!(tree.items[0].definition, "Vessel");
        assert_eq!(tree.items[0].children.len(), 1);
        assert!(tree.parameters.contains_key("vessel:polarstern:pco2:pre_xco2"));
    }

    #[test]
    fn key_collisions_keep_the_last_write_and_are_reported() {
        let tree = parse_one(json!({
            "id": 1,
            "code": "vessel:ps:ctd",
            "sensorOutputs": [
                { "id": 10, "shortName": "temp", "description": "first" },
                { "id": 11, "shortName": "temp", "description": "second" }
            ]
        }));

        assert_eq!(tree.collisions, vec!["vessel:ps:ctd:temp".to_string()]);
        assert_eq!(tree.parameters["vessel:ps:ctd:temp"].description, "second");
    }

    #[test]
    fn subitems_resolve_dual_shape_types() {
        let records = vec![
            json!({
                "id": 5,
                "code": "vessel:ps:ctd",
                "shortName": "CTD",
                "type": { "@uuid": TYPE_UUID, "generalName": "Instrument" }
            }),
            json!({
                "id": 6,
                "code": "vessel:ps:adcp",
                "shortName": "ADCP",
                "type": TYPE_UUID
            }),
        ];

        let subitems = parse_subitems(&records).unwrap();
        assert_eq!(subitems[0].definition, "Instrument");
        assert_eq!(subitems[1].definition, "Instrument");
        assert_eq!(subitems[1].code, "vessel:ps:adcp");
    }
}
