// SPDX-License-Identifier: Apache-2.0

use crate::snapshot::yaml_to_json;
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value};
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// A rule source that cannot be read or parsed is fatal to the whole run;
/// there is no safe partial policy to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLoadError(pub String);

impl Display for RuleLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RuleLoadError {}

/// Load and merge one or more rule documents.
///
/// Each source supports top-level `!include <relative-path>` lines (no
/// recursion). Sources merge by top-level key, later sources overriding.
/// Nested sequences produced by YAML anchor templating are flattened.
/// `overrides` uses the `name:where#name2:where2` syntax and replaces the
/// matching `subordinates` entries.
pub fn load_rules<P: AsRef<Path>>(
    sources: &[P],
    overrides: Option<&str>,
) -> Result<JsonValue, RuleLoadError> {
    let mut merged = Mapping::new();
    for source in sources {
        let source = source.as_ref();
        let raw = fs::read_to_string(source).map_err(|error| {
            RuleLoadError(format!("cannot read rules file {}: {error}", source.display()))
        })?;
        let expanded = process_includes(&raw, source);
        let document: Value = serde_yaml::from_str(&expanded).map_err(|error| {
            RuleLoadError(format!("cannot parse rules file {}: {error}", source.display()))
        })?;
        let Value::Mapping(document) = document else {
            return Err(RuleLoadError(format!(
                "rules file {} is not a mapping",
                source.display()
            )));
        };
        for (key, value) in document {
            merged.insert(key, flatten_sequences(value));
        }
    }

    if let Some(overrides) = overrides {
        apply_subordinate_overrides(&mut merged, overrides);
    }

    Ok(yaml_to_json(&Value::Mapping(merged)))
}

/// Top-level `!include` lines are replaced by the referenced file's content
/// before parsing. An unparsable include line is logged and dropped; a
/// missing include target is logged and dropped as well.
fn process_includes(raw: &str, source: &Path) -> String {
    let base = source.parent().unwrap_or_else(|| Path::new("."));
    let mut collector = Vec::new();
    for line in raw.lines() {
        if !line.starts_with("!include") {
            collector.push(line.to_string());
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(_), Some(rel_path), None) = (parts.next(), parts.next(), parts.next()) else {
            warn!(line, "invalid include in rules, ignored");
            continue;
        };
        let include_path = base.join(rel_path);
        match fs::read_to_string(&include_path) {
            Ok(content) => collector.push(content),
            Err(error) => {
                warn!(path = %include_path.display(), %error, "include target unreadable, ignored");
            }
        }
    }
    collector.join("\n")
}

/// YAML anchors used for templating leave nested lists behind; flatten them
/// so every top-level list is one level deep.
fn flatten_sequences(value: Value) -> Value {
    match value {
        Value::Sequence(items) => {
            let mut flat = Vec::new();
            for item in items {
                match flatten_sequences(item) {
                    Value::Sequence(nested) => flat.extend(nested),
                    other => flat.push(other),
                }
            }
            Value::Sequence(flat)
        }
        other => other,
    }
}

fn apply_subordinate_overrides(rules: &mut Mapping, overrides: &str) {
    if !rules.contains_key("subordinates") {
        rules.insert(
            Value::String("subordinates".to_string()),
            Value::Mapping(Mapping::new()),
        );
    }
    let Some(subordinates) = rules
        .get_mut("subordinates")
        .and_then(Value::as_mapping_mut)
    else {
        warn!("subordinates section is not a mapping; overrides ignored");
        return;
    };
    for entry in overrides.split('#') {
        let Some((name, placement)) = entry.split_once(':') else {
            warn!(entry, "invalid subordinate override, ignored");
            continue;
        };
        info!(name, placement, "overriding subordinate placement");
        let mut rule = Mapping::new();
        rule.insert(
            Value::String("where".to_string()),
            Value::String(placement.to_string()),
        );
        subordinates.insert(Value::String(name.to_string()), Value::Mapping(rule));
    }
}
