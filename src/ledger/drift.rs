//! Progress audit: find records that disagree with the catalog or with
//! themselves.

use crate::core::state::current_level;
use crate::core::types::{Catalog, Category, ProgressDocument, UserCategoryProgress};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftKind {
    /// Listed in `completed_skills` with levels still open.
    IncompleteSkill,
    /// Every level done but missing from `completed_skills`.
    UnmarkedCompletion,
    /// `current_level` differs from the first open level.
    StaleCurrentLevel,
    /// A completed level ordinal outside `1..=level_count`.
    UnknownLevel,
    /// Progress for a skill the category does not define.
    UnknownSkill,
    /// Progress for a category that is not in the catalog.
    UnknownCategory,
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::IncompleteSkill => "incomplete-skill",
            Self::UnmarkedCompletion => "unmarked-completion",
            Self::StaleCurrentLevel => "stale-current-level",
            Self::UnknownLevel => "unknown-level",
            Self::UnknownSkill => "unknown-skill",
            Self::UnknownCategory => "unknown-category",
        };
        write!(f, "{}", s)
    }
}

/// A single drift finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftFinding {
    pub category: String,
    pub skill: Option<String>,
    pub kind: DriftKind,
    pub detail: String,
}

/// Audit a user's progress document against the loaded catalog.
pub fn detect_drift(doc: &ProgressDocument, catalog: &Catalog) -> Vec<DriftFinding> {
    let mut findings = Vec::new();
    for (category_id, progress) in &doc.categories {
        match catalog.get(category_id) {
            Some(category) => check_category(category, progress, &mut findings),
            None => findings.push(DriftFinding {
                category: category_id.clone(),
                skill: None,
                kind: DriftKind::UnknownCategory,
                detail: "category is not in the loaded catalog".to_string(),
            }),
        }
    }
    findings
}

fn check_category(
    category: &Category,
    progress: &UserCategoryProgress,
    findings: &mut Vec<DriftFinding>,
) {
    let mut push = |skill: &str, kind: DriftKind, detail: String| {
        findings.push(DriftFinding {
            category: category.id.clone(),
            skill: Some(skill.to_string()),
            kind,
            detail,
        })
    };

    for skill_id in &progress.completed_skills {
        if progress.skill_progress.contains_key(skill_id) {
            continue;
        }
        match category.skill(skill_id) {
            None => push(
                skill_id,
                DriftKind::UnknownSkill,
                "marked complete but not in the category".to_string(),
            ),
            Some(skill) => push(
                skill_id,
                DriftKind::IncompleteSkill,
                format!("marked complete with 0/{} levels done", skill.level_count()),
            ),
        }
    }

    for (skill_id, sp) in &progress.skill_progress {
        let Some(skill) = category.skill(skill_id) else {
            push(
                skill_id,
                DriftKind::UnknownSkill,
                "has progress but is not in the category".to_string(),
            );
            continue;
        };
        let level_count = skill.level_count();

        let unknown: Vec<u32> = sp
            .completed_levels
            .iter()
            .copied()
            .filter(|&l| l == 0 || l > level_count)
            .collect();
        if !unknown.is_empty() {
            push(
                skill_id,
                DriftKind::UnknownLevel,
                format!("levels {:?} outside 1..={}", unknown, level_count),
            );
        }

        let done = (1..=level_count).all(|l| sp.completed_levels.contains(&l));
        let marked = progress.completed_skills.contains(skill_id);
        if marked && !done {
            push(
                skill_id,
                DriftKind::IncompleteSkill,
                format!(
                    "marked complete with {}/{} levels done",
                    sp.completed_levels.len() - unknown.len(),
                    level_count
                ),
            );
        }
        if done && !marked {
            push(
                skill_id,
                DriftKind::UnmarkedCompletion,
                format!("all {} levels done but not marked complete", level_count),
            );
        }

        let expected = current_level(&sp.completed_levels);
        if sp.current_level != expected {
            push(
                skill_id,
                DriftKind::StaleCurrentLevel,
                format!("current_level is {}, expected {}", sp.current_level, expected),
            );
        }
    }
}
