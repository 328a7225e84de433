//! Maps heterogeneous upstream candidate records onto `NormalizedCandidate`
//!
//! Each canonical field is resolved by walking an ordered list of sources and
//! taking the first one that yields a non-blank value. Order matters: upstream
//! sources disagree on naming and some keys are more authoritative than others.

use crate::types::{NormalizedCandidate, RawCandidate};
use serde_json::Value;
use std::time::SystemTime;

pub const NO_NAME: &str = "no name";
pub const UNSPECIFIED: &str = "unspecified";
pub const BIO_UNAVAILABLE: &str = "unavailable";

/// Where a field value may come from
#[derive(Debug, Clone, Copy)]
pub enum Source {
    /// String value under a top-level key
    Text(&'static str),
    /// String or number under a top-level key
    Scalar(&'static str),
    /// String value under `parent.child`, only when `parent` is an object
    Nested(&'static str, &'static str),
    /// First and last name parts joined with a space
    FullName,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub sources: &'static [Source],
    pub fallback: Option<&'static str>,
}

const FIRST_NAME_KEYS: &[&str] = &["first_name", "firstName", "firstname"];
const LAST_NAME_KEYS: &[&str] = &["last_name", "lastName", "lastname"];

pub const ID_RULE: FieldRule = FieldRule {
    sources: &[
        Source::Scalar("id"),
        Source::Scalar("mentor_id"),
        Source::Scalar("userId"),
    ],
    fallback: None,
};

pub const NAME_RULE: FieldRule = FieldRule {
    sources: &[
        Source::Text("name"),
        Source::Text("nombre"),
        Source::Text("full_name"),
        Source::Text("fullName"),
        Source::FullName,
    ],
    fallback: Some(NO_NAME),
};

// current_title wins over the generic keys; it is what the store writes.
pub const TITLE_RULE: FieldRule = FieldRule {
    sources: &[
        Source::Text("current_title"),
        Source::Text("title"),
        Source::Text("role"),
        Source::Text("position"),
        Source::Text("cargo"),
        Source::Text("puesto"),
    ],
    fallback: Some(UNSPECIFIED),
};

pub const COMPANY_RULE: FieldRule = FieldRule {
    sources: &[
        Source::Text("company"),
        Source::Text("organization"),
        Source::Text("empresa"),
        Source::Text("organizacion"),
    ],
    fallback: Some(UNSPECIFIED),
};

pub const BIO_RULE: FieldRule = FieldRule {
    sources: &[
        Source::Text("bio"),
        Source::Text("description"),
        Source::Text("about"),
        Source::Text("biografía"),
        Source::Nested("biometrics", "bio"),
        Source::Nested("biometrics", "description"),
        Source::Nested("bio", "bio"),
        Source::Nested("bio", "description"),
    ],
    fallback: Some(BIO_UNAVAILABLE),
};

pub const AVAILABLE_KEYS: &[&str] = &["available", "is_available", "disponible"];

/// All text rules, in the order the fields appear on `NormalizedCandidate`
pub const RULES: [FieldRule; 5] = [ID_RULE, NAME_RULE, TITLE_RULE, COMPANY_RULE, BIO_RULE];

impl FieldRule {
    /// First non-blank value among the sources, without applying the fallback
    pub fn resolve(&self, raw: &RawCandidate) -> Option<String> {
        self.sources.iter().find_map(|source| source.extract(raw))
    }
}

impl Source {
    fn extract(&self, raw: &RawCandidate) -> Option<String> {
        match *self {
            Source::Text(key) => raw.get(key).and_then(text_value),
            Source::Scalar(key) => raw.get(key).and_then(scalar_value),
            Source::Nested(parent, child) => match raw.get(parent) {
                Some(Value::Object(inner)) => inner.get(child).and_then(text_value),
                _ => None,
            },
            Source::FullName => {
                let first = first_text(raw, FIRST_NAME_KEYS).unwrap_or_default();
                let last = first_text(raw, LAST_NAME_KEYS).unwrap_or_default();
                non_blank(format!("{} {}", first, last).trim())
            }
        }
    }
}

fn first_text(raw: &RawCandidate, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| raw.get(*k).and_then(text_value))
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        _ => None,
    }
}

fn scalar_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_blank(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn availability(raw: &RawCandidate) -> Option<bool> {
    AVAILABLE_KEYS
        .iter()
        .find_map(|k| raw.get(*k).and_then(Value::as_bool))
}

/// Normalizes the candidates of one batch.
///
/// Holds the batch timestamp used to synthesize ids for records that carry
/// none, so every synthesized id in a batch shares a prefix and differs by
/// index. Such ids are unique within the process and batch only.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    stamp_ms: u128,
}

impl Normalizer {
    pub fn for_batch() -> Self {
        let stamp_ms = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self { stamp_ms }
    }

    pub fn with_stamp(stamp_ms: u128) -> Self {
        Self { stamp_ms }
    }

    /// Never fails; missing fields get their fallback literal
    pub fn normalize(&self, raw: &RawCandidate, index: usize) -> NormalizedCandidate {
        let [id, name, title, company, bio] =
            RULES.map(|rule| rule.resolve(raw).or_else(|| rule.fallback.map(str::to_string)));

        NormalizedCandidate {
            id: id.unwrap_or_else(|| format!("gen-{}-{}", self.stamp_ms, index)),
            name: name.unwrap_or_default(),
            title: title.unwrap_or_default(),
            company: company.unwrap_or_default(),
            bio: bio.unwrap_or_default(),
            available: availability(raw),
        }
    }

    pub fn normalize_all(&self, raws: &[RawCandidate]) -> Vec<NormalizedCandidate> {
        raws.iter()
            .enumerate()
            .map(|(idx, raw)| self.normalize(raw, idx))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawCandidate {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_current_title_beats_title() {
        let n = Normalizer::with_stamp(1);
        let c = n.normalize(
            &raw(json!({"current_title": "CTO", "title": "Engineer", "role": "Lead"})),
            0,
        );
        assert_eq!(c.title, "CTO");
    }

    #[test]
    fn test_name_from_parts() {
        let n = Normalizer::with_stamp(1);
        let c = n.normalize(
            &raw(json!({"first_name": "Teresa", "last_name": "Echeverría"})),
            0,
        );
        assert_eq!(c.name, "Teresa Echeverría");

        let c = n.normalize(&raw(json!({"firstName": "Ana"})), 0);
        assert_eq!(c.name, "Ana");
    }

    #[test]
    fn test_direct_name_beats_parts() {
        let n = Normalizer::with_stamp(1);
        let c = n.normalize(&raw(json!({"nombre": "Carlos", "first_name": "X"})), 0);
        assert_eq!(c.name, "Carlos");
    }

    #[test]
    fn test_fallbacks() {
        let n = Normalizer::with_stamp(42);
        let c = n.normalize(&RawCandidate::new(), 7);
        assert_eq!(c.id, "gen-42-7");
        assert_eq!(c.name, NO_NAME);
        assert_eq!(c.title, UNSPECIFIED);
        assert_eq!(c.company, UNSPECIFIED);
        assert_eq!(c.bio, BIO_UNAVAILABLE);
        assert_eq!(c.available, None);
    }

    #[test]
    fn test_id_resolution_order() {
        let n = Normalizer::with_stamp(1);
        let c = n.normalize(&raw(json!({"mentor_id": "m-9", "userId": "u-1"})), 0);
        assert_eq!(c.id, "m-9");

        let c = n.normalize(&raw(json!({"id": 5})), 0);
        assert_eq!(c.id, "5");
    }

    #[test]
    fn test_bio_sources() {
        let n = Normalizer::with_stamp(1);

        // non-string bio is skipped in favour of description
        let c = n.normalize(&raw(json!({"bio": 12, "description": "desc"})), 0);
        assert_eq!(c.bio, "desc");

        let c = n.normalize(&raw(json!({"biometrics": {"description": "nested"}})), 0);
        assert_eq!(c.bio, "nested");

        let c = n.normalize(&raw(json!({"bio": {"bio": "inner"}})), 0);
        assert_eq!(c.bio, "inner");
    }

    #[test]
    fn test_blank_values_fall_through() {
        let n = Normalizer::with_stamp(1);
        let c = n.normalize(&raw(json!({"company": "  ", "organization": "Acme"})), 0);
        assert_eq!(c.company, "Acme");
    }

    #[test]
    fn test_only_id_rule_lacks_fallback() {
        assert!(RULES[0].fallback.is_none());
        assert!(RULES[1..].iter().all(|rule| rule.fallback.is_some()));

        let record = raw(json!({"id": "x", "name": "N", "title": "T", "company": "C", "bio": "B"}));
        let resolved: Vec<_> = RULES.iter().filter_map(|rule| rule.resolve(&record)).collect();
        assert_eq!(resolved, vec!["x", "N", "T", "C", "B"]);
    }

    #[test]
    fn test_availability() {
        let n = Normalizer::with_stamp(1);
        let c = n.normalize(&raw(json!({"disponible": false})), 0);
        assert_eq!(c.available, Some(false));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let n = Normalizer::with_stamp(99);
        let samples = vec![
            json!({}),
            json!({
                "id": 3,
                "name": "John Doe",
                "title": "SWE",
                "company": "Google",
                "bio": "React"
            }),
            json!({
                "first_name": "Ana",
                "lastName": "Ruiz",
                "current_title": "PM",
                "about": "ux",
                "available": true
            }),
            json!({"userId": "u1", "biometrics": {"bio": "deep"}, "empresa": "X"}),
        ];

        for (idx, sample) in samples.into_iter().enumerate() {
            let once = n.normalize(&raw(sample), idx);
            let twice = n.normalize(&once.to_raw(), idx + 100);
            assert_eq!(once, twice);
        }
    }
}
