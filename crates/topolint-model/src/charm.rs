// SPDX-License-Identifier: Apache-2.0

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

/// A reference did not match the charm reference grammar.
///
/// This is a hard failure: a silently mis-resolved charm name would corrupt
/// every downstream check, so callers must propagate it rather than skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCharmReference(pub String);

impl Display for InvalidCharmReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "charm reference '{}' is invalid", self.0)
    }
}

impl std::error::Error for InvalidCharmReference {}

// Optional origin ("cs:", "ch:", "local:"), optional "~owner/", any number of
// series/architecture segments, the name itself, optional "-<revision>".
fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\w+:)?(?:~[\w.-]+/)?(?:\w+/)*([a-zA-Z0-9-]+?)(?:-\d+)?$")
            .expect("charm reference pattern")
    })
}

/// Canonical charm name, stripped of origin, owner, series and revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CharmName(String);

impl CharmName {
    pub fn parse(reference: &str) -> Result<Self, InvalidCharmReference> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(InvalidCharmReference(reference.to_string()));
        }
        let captures = reference_pattern()
            .captures(trimmed)
            .ok_or_else(|| InvalidCharmReference(reference.to_string()))?;
        match captures.get(1) {
            Some(name) => Ok(Self(name.as_str().to_string())),
            None => Err(InvalidCharmReference(reference.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for CharmName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decorated_references_resolve_to_bare_name() {
        let references = [
            "cs:~user/series/ntp-123",
            "cs:~user/ntp-123",
            "cs:ntp-123",
            "local:series/ntp",
            "local:ntp",
            "cs:~ntp-charmers/ntp-123",
            "ch:amd64/bionic/ntp-123",
            "ntp",
        ];
        for reference in references {
            let name = CharmName::parse(reference).expect(reference);
            assert_eq!(name.as_str(), "ntp", "reference {reference}");
        }
    }

    #[test]
    fn revision_suffix_is_stripped_only_when_numeric() {
        assert_eq!(CharmName::parse("ceph-osd-42").unwrap().as_str(), "ceph-osd");
        assert_eq!(CharmName::parse("ceph-osd").unwrap().as_str(), "ceph-osd");
    }

    #[test]
    fn malformed_references_fail() {
        for reference in ["cs:invalid-charm$", "", "cs:", "name with spaces"] {
            let err = CharmName::parse(reference).unwrap_err();
            assert_eq!(err, InvalidCharmReference(reference.to_string()));
        }
    }
}
