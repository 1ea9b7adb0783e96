//! Catalog document parsing and graph validation.
//!
//! Parses the metadata and detail tiers and validates structural constraints:
//! - Category and skill ids are unique
//! - Prerequisite and unlock references exist within the category
//! - `unlocks` is the exact inverse of `prerequisites`
//! - The prerequisite graph is acyclic
//! - Level ordinals run 1..N and match the summary's `total_levels`

use super::resolver;
use super::types::*;
use std::collections::HashSet;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    fn new(message: String) -> Self {
        Self { message }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Ids that become path components: ASCII alphanumerics, `-` and `_` only,
/// so nothing can escape the directory they are joined onto.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Parse a metadata document from a string.
pub fn parse_metadata(yaml: &str) -> Result<Metadata, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Parse a category detail partition from a string.
pub fn parse_category_detail(yaml: &str) -> Result<CategoryDetail, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Parse a metadata document from disk.
pub fn parse_metadata_file(path: &Path) -> Result<Metadata, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_metadata(&content)
}

/// Validate the metadata tier. Returns a list of errors (empty = valid).
pub fn validate_metadata(metadata: &Metadata) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut category_ids = HashSet::new();

    for category in &metadata.categories {
        if category.id.is_empty() {
            errors.push(ValidationError::new(format!(
                "category '{}' has an empty id",
                category.name
            )));
        }
        if !category_ids.insert(category.id.as_str()) {
            errors.push(ValidationError::new(format!(
                "duplicate category '{}'",
                category.id
            )));
        }
        validate_category(category, &mut errors);
    }

    errors
}

fn validate_category(category: &CategoryMeta, errors: &mut Vec<ValidationError>) {
    let cid = &category.id;
    let mut skill_ids = HashSet::new();
    for skill in &category.skills {
        if !skill_ids.insert(skill.id.as_str()) {
            errors.push(ValidationError::new(format!(
                "{}: duplicate skill '{}'",
                cid, skill.id
            )));
        }
    }

    let mut graph_ok = true;
    for skill in &category.skills {
        if skill.total_levels == 0 {
            errors.push(ValidationError::new(format!(
                "{}: skill '{}' has no levels",
                cid, skill.id
            )));
        }

        for dep in &skill.prerequisites {
            if dep == &skill.id {
                errors.push(ValidationError::new(format!(
                    "{}: skill '{}' requires itself",
                    cid, skill.id
                )));
                graph_ok = false;
                continue;
            }
            match category.skill(dep) {
                None => {
                    errors.push(ValidationError::new(format!(
                        "{}: skill '{}' requires unknown skill '{}'",
                        cid, skill.id, dep
                    )));
                    graph_ok = false;
                }
                Some(parent) if !parent.unlocks.contains(&skill.id) => {
                    errors.push(ValidationError::new(format!(
                        "{}: '{}' requires '{}' but '{}' does not list it in unlocks",
                        cid, skill.id, dep, dep
                    )));
                }
                Some(_) => {}
            }
        }

        for unlocked in &skill.unlocks {
            match category.skill(unlocked) {
                None => {
                    errors.push(ValidationError::new(format!(
                        "{}: skill '{}' unlocks unknown skill '{}'",
                        cid, skill.id, unlocked
                    )));
                }
                Some(child) if !child.prerequisites.contains(&skill.id) => {
                    errors.push(ValidationError::new(format!(
                        "{}: '{}' unlocks '{}' but '{}' does not require it",
                        cid, skill.id, unlocked, unlocked
                    )));
                }
                Some(_) => {}
            }
        }
    }

    // Cycle check only makes sense once every edge resolves.
    if graph_ok {
        if let Err(e) = resolver::unlock_order(&category.skills) {
            errors.push(ValidationError::new(format!("{}: {}", cid, e)));
        }
    }
}

/// Validate a detail partition against its metadata entry.
pub fn validate_detail(meta: &CategoryMeta, detail: &CategoryDetail) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let cid = &meta.id;

    if detail.id != meta.id {
        errors.push(ValidationError::new(format!(
            "detail partition '{}' loaded for category '{}'",
            detail.id, cid
        )));
    }

    for sd in &detail.skills {
        let Some(summary) = meta.skill(&sd.id) else {
            errors.push(ValidationError::new(format!(
                "{}: detail for unknown skill '{}'",
                cid, sd.id
            )));
            continue;
        };

        let mut ordinals: Vec<u32> = sd.levels.iter().map(|l| l.ordinal).collect();
        ordinals.sort_unstable();
        let expected: Vec<u32> = (1..=ordinals.len() as u32).collect();
        if ordinals != expected {
            errors.push(ValidationError::new(format!(
                "{}: skill '{}' level ordinals {:?} are not sequential from 1",
                cid, sd.id, ordinals
            )));
        }
        if sd.levels.len() as u32 != summary.total_levels {
            errors.push(ValidationError::new(format!(
                "{}: skill '{}' declares {} levels but defines {}",
                cid,
                sd.id,
                summary.total_levels,
                sd.levels.len()
            )));
        }
    }

    errors
}
