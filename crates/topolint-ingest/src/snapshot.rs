// SPDX-License-Identifier: Apache-2.0

use crate::IngestError;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value};

/// The two structural families a snapshot document can take. The
/// remote-session shape is a live-status document carrying a
/// `remote-applications` map, so it needs no shape of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotShape {
    Status,
    Bundle,
}

/// One parsed snapshot: the primary document with every overlay document
/// deep-merged onto it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    root: Mapping,
}

impl Snapshot {
    /// Parse a possibly multi-document YAML stream. The first document
    /// carrying an `applications` (or legacy `services`) key is the
    /// primary; later documents are overlay patches merged onto it.
    pub fn from_yaml_str(input: &str) -> Result<Self, IngestError> {
        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(input) {
            let value = Value::deserialize(document)
                .map_err(|error| IngestError(format!("snapshot is not valid YAML: {error}")))?;
            if let Value::Mapping(mapping) = value {
                documents.push(mapping);
            }
        }
        Self::from_documents(documents)
    }

    pub fn from_documents(documents: Vec<Mapping>) -> Result<Self, IngestError> {
        let mut primary: Option<Mapping> = None;
        let mut overlays = Vec::new();
        for document in documents {
            if primary.is_none() && applications_key(&document).is_some() {
                primary = Some(document);
            } else {
                overlays.push(document);
            }
        }
        let mut root = primary
            .ok_or_else(|| IngestError("snapshot contains no applications".to_string()))?;
        for overlay in overlays {
            deep_merge(&mut root, &overlay);
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Mapping {
        &self.root
    }

    /// A top-level `relations` sequence marks the exported-topology shape.
    #[must_use]
    pub fn shape(&self) -> SnapshotShape {
        match self.root.get("relations") {
            Some(Value::Sequence(_)) => SnapshotShape::Bundle,
            _ => SnapshotShape::Status,
        }
    }

    #[must_use]
    pub fn applications(&self) -> Option<&Mapping> {
        let key = applications_key(&self.root)?;
        self.root.get(key).and_then(Value::as_mapping)
    }

    #[must_use]
    pub fn machines(&self) -> Option<&Mapping> {
        self.root.get("machines").and_then(Value::as_mapping)
    }
}

fn applications_key(document: &Mapping) -> Option<&'static str> {
    if document.contains_key("applications") {
        Some("applications")
    } else if document.contains_key("services") {
        Some("services")
    } else {
        None
    }
}

/// Recursive mapping merge: nested mappings merge key by key, anything else
/// replaces. Overlays never replace the primary document wholesale.
pub fn deep_merge(existing: &mut Mapping, overlay: &Mapping) {
    for (key, value) in overlay {
        match (existing.get_mut(key), value) {
            (Some(Value::Mapping(current)), Value::Mapping(incoming)) => {
                deep_merge(current, incoming);
            }
            _ => {
                existing.insert(key.clone(), value.clone());
            }
        }
    }
}

/// YAML mapping keys are not always strings ("0:" parses as a number);
/// render scalars back to their textual form.
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Convert a YAML value into the JSON value space used by the model and the
/// checkers, stringifying non-string mapping keys on the way.
#[must_use]
pub fn yaml_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(flag) => JsonValue::Bool(*flag),
        Value::Number(number) => {
            serde_json::to_value(number).unwrap_or_else(|_| JsonValue::String(number.to_string()))
        }
        Value::String(text) => JsonValue::String(text.clone()),
        Value::Sequence(items) => JsonValue::Array(items.iter().map(yaml_to_json).collect()),
        Value::Mapping(mapping) => {
            let mut out = serde_json::Map::new();
            for (key, item) in mapping {
                if let Some(key) = scalar_to_string(key) {
                    out.insert(key, yaml_to_json(item));
                }
            }
            JsonValue::Object(out)
        }
        Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "
applications:
  ubuntu:
    charm: cs:ubuntu-19
machines:
  '0': {}
";

    #[test]
    fn overlay_documents_are_merged_not_replacing() {
        let stream = format!(
            "{BASE}--- # overlay.yaml
applications:
  ubuntu:
    offers:
      my-offer:
        endpoints: [monitors]
"
        );
        let snapshot = Snapshot::from_yaml_str(&stream).unwrap();
        let apps = snapshot.applications().unwrap();
        let ubuntu = apps.get("ubuntu").and_then(Value::as_mapping).unwrap();
        assert!(ubuntu.contains_key("charm"), "primary keys survive overlay");
        assert!(ubuntu.contains_key("offers"), "overlay keys are added");
    }

    #[test]
    fn overlay_merge_is_idempotent() {
        let mut base: Mapping = serde_yaml::from_str(BASE).unwrap();
        let overlay: Mapping =
            serde_yaml::from_str("applications:\n  ubuntu:\n    offers: {o: {}}\n").unwrap();
        deep_merge(&mut base, &overlay);
        let once = base.clone();
        deep_merge(&mut base, &overlay);
        assert_eq!(base, once);
    }

    #[test]
    fn shape_detection_follows_relations_key() {
        let status = Snapshot::from_yaml_str(BASE).unwrap();
        assert_eq!(status.shape(), SnapshotShape::Status);
        let bundle = Snapshot::from_yaml_str(&format!("{BASE}relations: []\n")).unwrap();
        assert_eq!(bundle.shape(), SnapshotShape::Bundle);
    }

    #[test]
    fn legacy_services_key_is_accepted() {
        let snapshot = Snapshot::from_yaml_str(
            "services:\n  ubuntu:\n    charm: cs:ubuntu-19\nmachines: {}\n",
        )
        .unwrap();
        assert!(snapshot.applications().is_some());
    }

    #[test]
    fn numeric_machine_keys_are_stringified() {
        let value: Value = serde_yaml::from_str("0: {hardware: x}\n1: {}").unwrap();
        let json = yaml_to_json(&value);
        assert!(json.get("0").is_some());
        assert!(json.get("1").is_some());
    }
}
