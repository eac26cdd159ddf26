//! Facet label derivation (§3 "Label").
//!
//! A label is `/<facet>/<hierarchical-key>` with
//! `facet ∈ {skills, locators, modules, domains}`. Labels are derived
//! deterministically from record content and are never user-supplied.
//!
//! `spec.md` §3 also lists `features` as a facet name for "older variants",
//! but §8's P4 requires a v0.3.1 record and a semantically equivalent
//! v0.5.0 record to yield *identical* label sets — which only holds if the
//! extension/module facet is named the same way regardless of variant.
//! [`extract_labels`] therefore always emits `/modules/<key>`, never
//! `/features/<key>`; `FEATURE` survives only as a query-type alias at the
//! routing layer (`dirnode-routing`) that matches against `/modules/`
//! labels, not as a distinct label family here.

use crate::record::NormalizedRecord;
use std::collections::BTreeSet;
use std::fmt;

/// A facet-prefixed path derived from a record, e.g.
/// `/skills/nlp/text_completion`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(String);

impl Label {
    fn new(facet: &str, key: &str) -> Label {
        Label(format!("/{facet}/{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Skill label key: `category_name/class_name` when both are set, else
/// `category_name` alone. A skill with neither set contributes no label.
fn skill_key(skill: &crate::record::Skill) -> Option<String> {
    match (&skill.category_name, &skill.class_name) {
        (Some(cat), Some(class)) => Some(format!("{cat}/{class}")),
        (Some(cat), None) => Some(cat.clone()),
        (None, _) => None,
    }
}

/// Enumerate the deterministic label set for a normalized record (§3, P4).
pub fn extract_labels(record: &NormalizedRecord) -> BTreeSet<Label> {
    let mut labels = BTreeSet::new();

    for skill in &record.skills {
        if let Some(key) = skill_key(skill) {
            labels.insert(Label::new("skills", &key));
        }
    }

    for locator in &record.locators {
        labels.insert(Label::new("locators", &locator.type_));
    }

    for ext in &record.extensions {
        labels.insert(Label::new("modules", &format!("{}/{}", ext.name, ext.version)));
        labels.insert(Label::new("modules", &ext.name));
    }

    for domain in &record.domains {
        labels.insert(Label::new("domains", &domain.name));
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Extension, Locator, Skill};

    fn record(skills: Vec<Skill>, extensions: Vec<Extension>) -> NormalizedRecord {
        NormalizedRecord {
            schema_version: "v0.5.0".into(),
            name: "x".into(),
            version: None,
            skills,
            locators: vec![Locator {
                type_: "docker-image".into(),
                url: "example/x:latest".into(),
            }],
            extensions,
            domains: vec![],
        }
    }

    #[test]
    fn test_skill_label_with_both_fields() {
        let r = record(
            vec![Skill {
                category_name: Some("nlp".into()),
                class_name: Some("text_completion".into()),
                id: None,
            }],
            vec![],
        );
        let labels = extract_labels(&r);
        assert!(labels.contains(&Label::new("skills", "nlp/text_completion")));
    }

    #[test]
    fn test_skill_label_category_only() {
        let r = record(
            vec![Skill {
                category_name: Some("nlp".into()),
                class_name: None,
                id: None,
            }],
            vec![],
        );
        let labels = extract_labels(&r);
        assert!(labels.contains(&Label::new("skills", "nlp")));
    }

    #[test]
    fn test_skill_with_no_category_contributes_no_label() {
        let r = record(
            vec![Skill {
                category_name: None,
                class_name: Some("text_completion".into()),
                id: None,
            }],
            vec![],
        );
        let labels = extract_labels(&r);
        assert!(labels.iter().all(|l| !l.as_str().starts_with("/skills/")));
    }

    #[test]
    fn test_locator_label() {
        let r = record(vec![], vec![]);
        let labels = extract_labels(&r);
        assert!(labels.contains(&Label::new("locators", "docker-image")));
    }

    #[test]
    fn test_extension_labels_use_modules_facet_never_features() {
        let r = record(
            vec![],
            vec![Extension {
                name: "token-streaming".into(),
                version: "1.2.0".into(),
            }],
        );
        let labels = extract_labels(&r);
        assert!(labels.contains(&Label::new("modules", "token-streaming/1.2.0")));
        assert!(labels.contains(&Label::new("modules", "token-streaming")));
        assert!(labels.iter().all(|l| !l.as_str().starts_with("/features/")));
    }

    #[test]
    fn test_label_set_stable_across_variants_p4() {
        // Same semantic content via a v0.3.1-shaped normalized record
        // (no domains) and a v0.5.0-shaped one (with domains) should
        // produce identical non-domain label sets.
        let v031 = NormalizedRecord {
            schema_version: "v0.3.1".into(),
            name: "x".into(),
            version: None,
            skills: vec![Skill {
                category_name: Some("nlp".into()),
                class_name: Some("tc".into()),
                id: None,
            }],
            locators: vec![],
            extensions: vec![Extension {
                name: "streaming".into(),
                version: "1.0.0".into(),
            }],
            domains: vec![],
        };
        let mut v05 = v031.clone();
        v05.schema_version = "v0.5.0".into();
        assert_eq!(extract_labels(&v031), extract_labels(&v05));
    }
}
