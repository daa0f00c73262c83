//! Field schema store: categories, aliases, and field definitions
//!
//! The schema (`fields.yaml`) declares what a complete research record
//! looks like. Field names are held in canonical token form so that
//! producer-supplied spellings ("Release Date", "release_date") collapse
//! to one definition, and categories resolve by canonical name or any
//! declared alias.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::slug;

fn default_detail_level() -> DetailLevel {
    DetailLevel::Moderate
}

/// How much prose a worker should gather for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Brief,
    Moderate,
    Detailed,
}

/// One researchable field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_detail_level")]
    pub detail_level: DetailLevel,
    #[serde(default)]
    pub required: bool,
}

/// A named grouping of fields with producer-visible aliases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl CategorySpec {
    /// True when `key` names this category, either by canonical name or
    /// by any alias. Comparison happens in token form, so record keys
    /// like "Basic Info" and "basic_info" both match.
    pub fn matches_key(&self, key: &str) -> bool {
        let token = slug::field_token(key);
        if slug::field_token(&self.category) == token {
            return true;
        }
        self.aliases
            .iter()
            .any(|alias| slug::field_token(alias) == token)
    }
}

/// The whole schema document (`fields.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSchema {
    pub field_categories: Vec<CategorySpec>,
}

/// Counts and side effects reported by a merge into the schema
#[derive(Debug, Default)]
pub struct FieldMergeOutcome {
    pub added: usize,
    pub duplicates: usize,
    pub new_categories: Vec<String>,
}

impl FieldSchema {
    pub async fn load(path: &Path) -> PipelineResult<Self> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::SchemaMissing {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(PipelineError::malformed(path, format!("unreadable: {}", e))),
        };
        let schema: FieldSchema =
            serde_yaml::from_str(&text).map_err(|e| PipelineError::malformed(path, e.to_string()))?;
        schema.validate(path)?;
        Ok(schema)
    }

    /// Load a candidate document for `add-fields`. Same shape as the
    /// schema itself, but duplicates against the current schema are
    /// expected and resolved by the merge, so no uniqueness check here.
    pub async fn load_candidates(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let schema: FieldSchema =
            serde_yaml::from_str(&text).map_err(|e| PipelineError::malformed(path, e.to_string()))?;
        Ok(schema)
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self).context("failed to serialize field schema")?;
        tokio::fs::write(path, yaml)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn validate(&self, path: &Path) -> PipelineResult<()> {
        let mut seen = HashSet::new();
        for spec in &self.field_categories {
            if spec.category.trim().is_empty() {
                return Err(PipelineError::malformed(path, "category with empty name"));
            }
            for field in &spec.fields {
                let token = slug::field_token(&field.name);
                if token.is_empty() {
                    return Err(PipelineError::malformed(
                        path,
                        format!("field with empty name in category '{}'", spec.category),
                    ));
                }
                if !seen.insert(token.clone()) {
                    return Err(PipelineError::malformed(
                        path,
                        format!("duplicate field '{}' (names are unique across categories)", token),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolve a category by canonical name or alias.
    pub fn resolve_category(&self, key: &str) -> Option<&CategorySpec> {
        self.field_categories.iter().find(|spec| spec.matches_key(key))
    }

    /// True when `key` is a category-grouping key rather than a field.
    pub fn is_category_key(&self, key: &str) -> bool {
        self.resolve_category(key).is_some()
    }

    /// Find a field definition by name in any spelling, together with the
    /// category that owns it.
    pub fn find_field(&self, name: &str) -> Option<(&CategorySpec, &FieldDefinition)> {
        let token = slug::field_token(name);
        self.fields().find(|(_, field)| field.name == token)
    }

    /// All fields in declared order, each with its owning category.
    pub fn fields(&self) -> impl Iterator<Item = (&CategorySpec, &FieldDefinition)> {
        self.field_categories
            .iter()
            .flat_map(|spec| spec.fields.iter().map(move |field| (spec, field)))
    }

    /// Merge candidate categories and fields. Field names are stored in
    /// canonical token form; a candidate whose token already exists
    /// anywhere in the schema counts as a duplicate and is dropped.
    /// Unknown categories are created implicitly and reported.
    pub fn add_fields(&mut self, candidates: FieldSchema) -> FieldMergeOutcome {
        let mut outcome = FieldMergeOutcome::default();

        for candidate in candidates.field_categories {
            let idx = match self
                .field_categories
                .iter()
                .position(|spec| spec.matches_key(&candidate.category))
            {
                Some(idx) => idx,
                None => {
                    let name = candidate.category.trim().to_string();
                    // New categories start with their own name as sole alias
                    self.field_categories.push(CategorySpec {
                        category: name.clone(),
                        aliases: vec![name.clone()],
                        fields: Vec::new(),
                    });
                    outcome.new_categories.push(name);
                    self.field_categories.len() - 1
                }
            };

            for alias in &candidate.aliases {
                if !self.field_categories[idx].matches_key(alias) {
                    self.field_categories[idx].aliases.push(alias.clone());
                }
            }

            for field in candidate.fields {
                let token = slug::field_token(&field.name);
                if token.is_empty() || self.find_field(&token).is_some() {
                    outcome.duplicates += 1;
                    continue;
                }
                self.field_categories[idx].fields.push(FieldDefinition {
                    name: token,
                    ..field
                });
                outcome.added += 1;
            }
        }

        outcome
    }
}
