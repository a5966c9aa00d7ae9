// SPDX-License-Identifier: Apache-2.0

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDocError(pub String);

impl Display for RuleDocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RuleDocError {}

/// Where a required subordinate must be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    All,
    AllOrNothing,
    HostOnly,
    MetalOnly,
    ContainerAware,
    On(String),
    AllExcept(String),
}

impl Placement {
    pub fn parse(raw: &str) -> Result<Self, RuleDocError> {
        if let Some(app) = raw.strip_prefix("on ") {
            return Ok(Self::On(app.to_string()));
        }
        if let Some(app) = raw.strip_prefix("all except ") {
            return Ok(Self::AllExcept(app.to_string()));
        }
        match raw {
            "all" => Ok(Self::All),
            "all or nothing" => Ok(Self::AllOrNothing),
            "host only" => Ok(Self::HostOnly),
            "metal only" => Ok(Self::MetalOnly),
            "container aware" => Ok(Self::ContainerAware),
            other => Err(RuleDocError(format!(
                "invalid subordinate requirement '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubordinateRule {
    pub name: String,
    /// `None` when the rule declares no `where`, or declared an invalid
    /// one; the rule then only participates in duplicate detection.
    pub placement: Option<Placement>,
    pub host_suffixes: Vec<String>,
    pub container_suffixes: Vec<String>,
    pub exceptions: BTreeSet<String>,
    pub allow_multiple: bool,
}

/// The closed set of config operators, resolved by name at document-read
/// time against a validated whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOperator {
    Eq,
    Neq,
    Gte,
    IsSet,
    Search,
}

impl ConfigOperator {
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "gte" => Some(Self::Gte),
            "isset" => Some(Self::IsSet),
            "search" => Some(Self::Search),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gte => "gte",
            Self::IsSet => "isset",
            Self::Search => "search",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Gte => ">=",
            Self::IsSet => "isset",
            Self::Search => "search",
        }
    }
}

/// One config assertion: operator plus operand for one option of one charm.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRule {
    pub option: String,
    pub op: ConfigOperator,
    pub operand: Value,
    pub suffixes: Vec<String>,
    pub custom_message: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelationRuleSpec {
    pub charm: String,
    pub check: Vec<Vec<String>>,
    pub not_exist: Vec<Vec<String>>,
    pub exception: BTreeSet<String>,
    pub ubiquitous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpaceChecks {
    pub enforce_endpoints: Vec<String>,
    pub ignore_endpoints: Vec<String>,
    pub enforce_relations: Vec<Vec<String>>,
    pub ignore_relations: Vec<Vec<String>>,
}

/// Typed accessors over the merged rule document. The document itself is a
/// generic key/value tree; every reserved key is decoded on access, and a
/// malformed section degrades to an empty one with a warning.
#[derive(Debug, Clone, Default)]
pub struct RuleDoc {
    root: Map<String, Value>,
}

impl RuleDoc {
    pub fn from_value(value: Value) -> Result<Self, RuleDocError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(RuleDocError("rule document must be a mapping".to_string())),
        }
    }

    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.root.contains_key(key)
    }

    /// A list-of-strings section; scalars other than strings are skipped.
    #[must_use]
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.root
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn known_charms(&self) -> Option<BTreeSet<String>> {
        self.root
            .get("known charms")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
    }

    #[must_use]
    pub fn saas(&self) -> BTreeSet<String> {
        self.string_list("saas").into_iter().collect()
    }

    #[must_use]
    pub fn subordinates(&self) -> BTreeMap<String, SubordinateRule> {
        let Some(section) = self.root.get("subordinates").and_then(Value::as_object) else {
            return BTreeMap::new();
        };
        let mut out = BTreeMap::new();
        for (name, body) in section {
            let Some(body) = body.as_object() else {
                warn!(subordinate = %name, "subordinate rule is not a mapping; skipping");
                continue;
            };
            let placement = match body.get("where").and_then(Value::as_str) {
                Some(raw) => match Placement::parse(raw) {
                    Ok(placement) => Some(placement),
                    Err(error) => {
                        warn!(subordinate = %name, %error, "skipping placement rule");
                        None
                    }
                },
                None => None,
            };
            out.insert(
                name.clone(),
                SubordinateRule {
                    name: name.clone(),
                    placement,
                    host_suffixes: string_array(body.get("host-suffixes")),
                    container_suffixes: string_array(body.get("container-suffixes")),
                    exceptions: string_array(body.get("exceptions")).into_iter().collect(),
                    allow_multiple: body
                        .get("allow-multiple")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                },
            );
        }
        out
    }

    /// Config assertions of one section ("config", "openstack config", ...)
    /// keyed by charm name. Operator keys outside the whitelist are logged
    /// and skipped.
    #[must_use]
    pub fn config_rules(&self, section: &str) -> BTreeMap<String, Vec<ConfigRule>> {
        let Some(section_body) = self.root.get(section).and_then(Value::as_object) else {
            return BTreeMap::new();
        };
        let mut out: BTreeMap<String, Vec<ConfigRule>> = BTreeMap::new();
        for (charm, options) in section_body {
            let Some(options) = options.as_object() else {
                warn!(charm = %charm, section, "config rules are not a mapping; skipping");
                continue;
            };
            for (option, body) in options {
                let Some(body) = body.as_object() else {
                    warn!(charm = %charm, option = %option, "config rule is not a mapping; skipping");
                    continue;
                };
                let suffixes = string_array(body.get("suffixes"));
                let custom_message = body
                    .get("custom-message")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let log_level = body
                    .get("log-level")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                for (key, operand) in body {
                    if matches!(key.as_str(), "suffixes" | "custom-message" | "log-level") {
                        continue;
                    }
                    let Some(op) = ConfigOperator::from_key(key) else {
                        warn!(
                            charm = %charm,
                            option = %option,
                            operation = %key,
                            "unknown config check operation; skipping"
                        );
                        continue;
                    };
                    out.entry(charm.clone()).or_default().push(ConfigRule {
                        option: option.clone(),
                        op,
                        operand: operand.clone(),
                        suffixes: suffixes.clone(),
                        custom_message: custom_message.clone(),
                        log_level: log_level.clone(),
                    });
                }
            }
        }
        out
    }

    #[must_use]
    pub fn relation_rules(&self) -> Vec<RelationRuleSpec> {
        let Some(section) = self.root.get("relations").and_then(Value::as_array) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for entry in section {
            let Some(entry) = entry.as_object() else {
                warn!("relation rule is not a mapping; skipping");
                continue;
            };
            let Some(charm) = entry.get("charm").and_then(Value::as_str) else {
                warn!("relation rule has no charm; skipping");
                continue;
            };
            out.push(RelationRuleSpec {
                charm: charm.to_string(),
                check: pair_array(entry.get("check")),
                not_exist: pair_array(entry.get("not-exist")),
                exception: string_array(entry.get("exception")).into_iter().collect(),
                ubiquitous: entry
                    .get("ubiquitous")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            });
        }
        out
    }

    #[must_use]
    pub fn space_checks(&self) -> SpaceChecks {
        let Some(section) = self.root.get("space checks").and_then(Value::as_object) else {
            return SpaceChecks::default();
        };
        SpaceChecks {
            enforce_endpoints: string_array(section.get("enforce endpoints")),
            ignore_endpoints: string_array(section.get("ignore endpoints")),
            enforce_relations: pair_array(section.get("enforce relations")),
            ignore_relations: pair_array(section.get("ignore relations")),
        }
    }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn pair_array(value: Option<&Value>) -> Vec<Vec<String>> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_array)
                .map(|pair| {
                    pair.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placement_grammar_covers_all_forms() {
        assert_eq!(Placement::parse("all"), Ok(Placement::All));
        assert_eq!(Placement::parse("host only"), Ok(Placement::HostOnly));
        assert_eq!(
            Placement::parse("on ceph-osd"),
            Ok(Placement::On("ceph-osd".to_string()))
        );
        assert_eq!(
            Placement::parse("all except mysql"),
            Ok(Placement::AllExcept("mysql".to_string()))
        );
        assert!(Placement::parse("everywhere").is_err());
    }

    #[test]
    fn invalid_placement_degrades_to_duplicate_check_only() {
        let doc = RuleDoc::from_value(json!({
            "subordinates": {"ntp": {"where": "everywhere", "allow-multiple": true}}
        }))
        .unwrap();
        let rules = doc.subordinates();
        assert_eq!(rules["ntp"].placement, None);
        assert!(rules["ntp"].allow_multiple);
    }

    #[test]
    fn config_operator_whitelist_is_closed() {
        let doc = RuleDoc::from_value(json!({
            "config": {
                "keystone": {
                    "workers": {"gte": 4, "log-level": "warning"},
                    "token-expiry": {"bogus-op": 1}
                }
            }
        }))
        .unwrap();
        let rules = doc.config_rules("config");
        let keystone = &rules["keystone"];
        assert_eq!(keystone.len(), 1);
        assert_eq!(keystone[0].op, ConfigOperator::Gte);
        assert_eq!(keystone[0].log_level.as_deref(), Some("warning"));
    }

    #[test]
    fn relation_rules_decode_all_kinds() {
        let doc = RuleDoc::from_value(json!({
            "relations": [
                {"charm": "nrpe", "check": [["nrpe:monitors", "nagios:monitors"]]},
                {"charm": "ntp", "ubiquitous": true},
            ]
        }))
        .unwrap();
        let rules = doc.relation_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].check.len(), 1);
        assert!(rules[1].ubiquitous);
    }
}
