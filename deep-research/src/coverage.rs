//! Field coverage validation: one record against the schema
//!
//! Records are loosely structured, so every field is located through a
//! three-stage lookup that tolerates flat layouts, category nesting, and
//! arbitrary deeper nesting. Validation never fails on malformed shapes;
//! a record that is not a mapping simply resolves no fields.

use serde_json::Value;
use std::collections::HashSet;

use crate::record::{self, ResultRecord};
use crate::schema::{CategorySpec, FieldSchema};
use crate::slug;

/// How one schema field resolves against a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPresence {
    /// Found with a usable value
    Valid,
    /// Found, but flagged by the sentinel or the record's uncertain list
    Uncertain,
    /// Not found, or found empty
    Missing,
}

/// Per-field findings and required coverage for one record
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Required fields with no present-valid value (ERROR)
    pub required_missing: Vec<String>,
    /// Optional fields with no present-valid value (WARN)
    pub optional_missing: Vec<String>,
    /// Record keys with no matching field definition (INFO), original
    /// spelling, encounter order
    pub extra: Vec<String>,
    /// Fields present but flagged uncertain, tracked apart from true absences
    pub uncertain: Vec<String>,
    pub required_present: usize,
    pub required_total: usize,
}

impl ValidationOutcome {
    /// Required-field coverage in [0, 1]; 1.0 when nothing is required.
    pub fn coverage(&self) -> f64 {
        if self.required_total == 0 {
            1.0
        } else {
            self.required_present as f64 / self.required_total as f64
        }
    }

    pub fn passes(&self) -> bool {
        self.required_missing.is_empty()
    }
}

/// Locate a field's value in a record. Stages, first match wins:
/// (a) canonical name at the top level, (b) nested one level under any
/// key matching the owning category's canonical name or aliases, (c) a
/// full recursive search of all nested mappings.
pub fn lookup<'a>(data: &'a Value, category: &CategorySpec, token: &str) -> Option<&'a Value> {
    if let Value::Object(map) = data {
        if let Some(found) = get_by_token(map, token) {
            return Some(found);
        }
        for (key, value) in map {
            if category.matches_key(key) {
                if let Some(found) = value.as_object().and_then(|m| get_by_token(m, token)) {
                    return Some(found);
                }
            }
        }
    }
    deep_find(data, token)
}

/// Lookup without a known owning category: stages (a) and (c) only.
/// Used for caller-supplied field names outside the schema.
pub fn lookup_loose<'a>(data: &'a Value, token: &str) -> Option<&'a Value> {
    deep_find(data, token)
}

fn get_by_token<'a>(map: &'a serde_json::Map<String, Value>, token: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(key, _)| slug::field_token(key) == token)
        .map(|(_, value)| value)
}

fn deep_find<'a>(value: &'a Value, token: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = get_by_token(map, token) {
                return Some(found);
            }
            map.values().find_map(|child| deep_find(child, token))
        }
        Value::Array(items) => items.iter().find_map(|item| deep_find(item, token)),
        _ => None,
    }
}

/// Classify a lookup result for one field token.
pub fn classify(record: &ResultRecord, found: Option<&Value>, token: &str) -> FieldPresence {
    match found {
        None => FieldPresence::Missing,
        Some(value) => {
            if record::value_is_sentinel(value) || record.is_uncertain(token) {
                FieldPresence::Uncertain
            } else if record::value_is_empty(value) {
                FieldPresence::Missing
            } else {
                FieldPresence::Valid
            }
        }
    }
}

/// Candidate data keys of a record in encounter order: top-level keys plus
/// keys nested under category-grouping keys. Internal bookkeeping keys and
/// the grouping keys themselves are excluded.
pub fn harvest_keys<'a>(data: &'a Value, schema: &FieldSchema) -> Vec<(&'a str, &'a Value)> {
    let mut keys = Vec::new();
    match data {
        Value::Object(map) => harvest_object(map, schema, &mut keys),
        Value::Array(items) => {
            for item in items {
                if let Value::Object(map) = item {
                    harvest_object(map, schema, &mut keys);
                }
            }
        }
        _ => {}
    }
    keys
}

fn harvest_object<'a>(
    map: &'a serde_json::Map<String, Value>,
    schema: &FieldSchema,
    out: &mut Vec<(&'a str, &'a Value)>,
) {
    for (key, value) in map {
        if record::is_internal_key(key) {
            continue;
        }
        if schema.is_category_key(key) {
            // Grouping keys are structure, not data; descend into mappings only
            if let Value::Object(nested) = value {
                harvest_object(nested, schema, out);
            }
            continue;
        }
        out.push((key.as_str(), value));
    }
}

/// Check one record against the schema.
pub fn validate(record: &ResultRecord, schema: &FieldSchema) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for (spec, field) in schema.fields() {
        if field.required {
            outcome.required_total += 1;
        }
        let found = lookup(&record.data, spec, &field.name);
        match classify(record, found, &field.name) {
            FieldPresence::Valid => {
                if field.required {
                    outcome.required_present += 1;
                }
            }
            FieldPresence::Uncertain => {
                outcome.uncertain.push(field.name.clone());
                if field.required {
                    outcome.required_missing.push(field.name.clone());
                } else {
                    outcome.optional_missing.push(field.name.clone());
                }
            }
            FieldPresence::Missing => {
                if field.required {
                    outcome.required_missing.push(field.name.clone());
                } else {
                    outcome.optional_missing.push(field.name.clone());
                }
            }
        }
    }

    let mut seen = HashSet::new();
    for (key, _) in harvest_keys(&record.data, schema) {
        let token = slug::field_token(key);
        if schema.find_field(&token).is_some() {
            continue;
        }
        if seen.insert(token) {
            outcome.extra.push(key.to_string());
        }
    }

    outcome
}
